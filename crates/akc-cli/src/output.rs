//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use akc_core::{ClueResolution, ClueSet, EncodedCluePayload, Resolution, ResolveMethod};
use serde::Serialize;

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn is_json(&self) -> bool {
        matches!(self.format, OutputFormat::Json)
    }

    /// Print any serializable value as pretty JSON
    pub fn json<T: Serialize + ?Sized>(&self, value: &T) {
        match serde_json::to_string_pretty(value) {
            Ok(s) => println!("{}", s),
            Err(e) => eprintln!("Error: failed to render JSON: {}", e),
        }
    }

    /// Print a single set with its clues
    pub fn print_set(&self, set: &ClueSet) {
        match self.format {
            OutputFormat::Human => {
                println!("ID:          {}", set.id);
                println!("Title:       {}", set.title);
                if let Some(ref desc) = set.description {
                    println!("Description: {}", desc);
                }
                println!("Created:     {}", set.created_at.format("%Y-%m-%d %H:%M"));
                println!("Updated:     {}", set.updated_at.format("%Y-%m-%d %H:%M"));

                println!();
                if set.items.is_empty() {
                    println!("No clues in this set.");
                    return;
                }
                println!("── Clues ({}) ──", set.items.len());
                for (pos, item) in set.items.iter().enumerate() {
                    let preview = item
                        .preview
                        .as_deref()
                        .map(|p| truncate(p, 50))
                        .unwrap_or_default();
                    println!(
                        "{:>3}. {} #{} {}",
                        pos,
                        truncate(&item.story_id, 40),
                        item.segment_index,
                        preview
                    );
                }
            }
            OutputFormat::Json => self.json(set),
            OutputFormat::Quiet => {
                println!("{}", set.id);
            }
        }
    }

    /// Print a list of sets
    pub fn print_sets(&self, sets: &[&ClueSet]) {
        match self.format {
            OutputFormat::Human => {
                if sets.is_empty() {
                    println!("No clue sets found.");
                    return;
                }
                for set in sets {
                    println!(
                        "{} | {} | {} clue(s)",
                        short_id(&set.id),
                        truncate(&set.title, 40),
                        set.items.len()
                    );
                }
                println!("\n{} set(s)", sets.len());
            }
            OutputFormat::Json => self.json(sets),
            OutputFormat::Quiet => {
                for set in sets {
                    println!("{}", set.id);
                }
            }
        }
    }

    /// Print a decoded share code payload
    pub fn print_payload(&self, payload: &EncodedCluePayload) {
        match self.format {
            OutputFormat::Human => {
                println!("Stories ({}):", payload.stories.len());
                for (i, story) in payload.stories.iter().enumerate() {
                    println!("  [{}] {}", i, story);
                }
                println!("Clues ({}):", payload.items.len());
                for item in &payload.items {
                    let story = payload
                        .stories
                        .get(item.story_index as usize)
                        .map(String::as_str)
                        .unwrap_or("?");
                    println!(
                        "  {} #{}  digest {:016x}",
                        story, item.segment_index, item.digest64
                    );
                }
            }
            OutputFormat::Json => self.json(payload),
            OutputFormat::Quiet => {
                println!("{}", payload.items.len());
            }
        }
    }

    /// Print per-clue resolution results
    pub fn print_resolutions(&self, results: &[ClueResolution]) {
        match self.format {
            OutputFormat::Human => {
                if results.is_empty() {
                    println!("No clues to resolve.");
                    return;
                }
                let mut resolved = 0;
                for r in results {
                    let status = match r.resolution {
                        Resolution::Resolved { index, method } => {
                            resolved += 1;
                            format!("-> #{} ({})", index, method_label(method))
                        }
                        Resolution::Unresolved => "unresolved".to_string(),
                    };
                    println!(
                        "{} #{} {}",
                        truncate(&r.item.story_id, 40),
                        r.item.segment_index,
                        status
                    );
                }
                println!("\n{}/{} resolved", resolved, results.len());
            }
            OutputFormat::Json => {
                let rows: Vec<_> = results
                    .iter()
                    .map(|r| {
                        serde_json::json!({
                            "storyId": r.item.story_id,
                            "segmentIndex": r.item.segment_index,
                            "resolution": r.resolution,
                        })
                    })
                    .collect();
                self.json(&rows);
            }
            OutputFormat::Quiet => {
                for r in results {
                    match r.resolution.index() {
                        Some(i) => println!("{}", i),
                        None => println!("-"),
                    }
                }
            }
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print a warning to stderr (shown in every mode)
    pub fn warning(&self, message: &str) {
        eprintln!("Warning: {}", message);
    }

    /// Check if we should prompt for confirmation
    pub fn should_prompt(&self) -> bool {
        self.format == OutputFormat::Human
    }

    /// Print an informational message
    pub fn message(&self, msg: &str) {
        match self.format {
            OutputFormat::Human => println!("{}", msg),
            OutputFormat::Json => {
                println!("{}", serde_json::json!({"message": msg}));
            }
            OutputFormat::Quiet => {}
        }
    }
}

fn method_label(method: ResolveMethod) -> &'static str {
    match method {
        ResolveMethod::Direct => "direct",
        ResolveMethod::Neighborhood => "moved",
        ResolveMethod::Preview => "preview match",
    }
}

/// First characters of a set id, enough to type back as a prefix
pub fn short_id(id: &str) -> &str {
    match id.char_indices().nth(16) {
        Some((end, _)) => &id[..end],
        None => id,
    }
}

/// Truncate a string to max characters, adding "..." if truncated
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
