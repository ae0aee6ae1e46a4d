//! Classification of reassembled lines into typed blocks.
//!
//! Two schemes share one output contract (an ordered sequence of blocks with
//! every input line accounted for):
//! - `FenceClassifier` (canonical): markdown fences with a `bash`/`sh` tag
//!   mark executable commands, everything else is narration.
//! - `MarkerClassifier` (legacy): a leading marker token flags narration,
//!   unmarked lines are opaque child output that is logged and nothing more.

const FENCE: &str = "```";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    /// Free text meant for human reading.
    Narration,
    /// A shell instruction to execute.
    Command,
    /// Raw child output captured in marker mode; logged, never delivered or
    /// executed.
    Passthrough,
}

/// A classified unit of agent output. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub kind: BlockKind,
    pub text: String,
    pub language: Option<String>,
}

impl Block {
    fn narration(text: String) -> Self {
        Self {
            kind: BlockKind::Narration,
            text,
            language: None,
        }
    }
}

#[derive(Debug)]
struct OpenFence {
    language: String,
    opener: String,
    lines: Vec<String>,
}

impl OpenFence {
    fn close(self) -> Block {
        let language = (!self.language.is_empty()).then_some(self.language.clone());
        if self.language == "bash" || self.language == "sh" {
            Block {
                kind: BlockKind::Command,
                text: self.lines.join("\n"),
                language,
            }
        } else {
            // Keep the delimiters so relayed markdown still renders fenced.
            let mut lines = vec![self.opener];
            lines.extend(self.lines);
            lines.push(FENCE.to_string());
            Block {
                kind: BlockKind::Narration,
                text: lines.join("\n"),
                language,
            }
        }
    }

    /// The fence never closed: degrade to narration, opener included, so no
    /// line is lost and nothing inside gets executed.
    fn degrade(self) -> Block {
        let language = (!self.language.is_empty()).then_some(self.language);
        let mut lines = vec![self.opener];
        lines.extend(self.lines);
        Block {
            kind: BlockKind::Narration,
            text: lines.join("\n"),
            language,
        }
    }
}

/// Markdown-fence grammar: a fence opens on a line starting with three
/// backticks plus an optional language tag and closes on a line that is
/// exactly three backticks. Only `bash` and `sh` tags (exact, case-sensitive)
/// make a command block.
#[derive(Debug, Default)]
pub struct FenceClassifier {
    fence: Option<OpenFence>,
}

impl FenceClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify one group of complete lines. Consecutive narration lines in
    /// the group are batched into a single block; a fence opening flushes the
    /// pending narration first, so ordering follows the input.
    pub fn push_lines(&mut self, lines: &[String]) -> Vec<Block> {
        let mut blocks = Vec::new();
        let mut narration: Vec<String> = Vec::new();

        for line in lines {
            match self.fence.take() {
                Some(mut open) => {
                    if line == FENCE {
                        blocks.push(open.close());
                    } else {
                        open.lines.push(line.clone());
                        self.fence = Some(open);
                    }
                }
                None => {
                    if let Some(tag) = line.strip_prefix(FENCE) {
                        if !narration.is_empty() {
                            blocks.push(Block::narration(narration.join("\n")));
                            narration.clear();
                        }
                        self.fence = Some(OpenFence {
                            language: tag.trim().to_string(),
                            opener: line.clone(),
                            lines: Vec::new(),
                        });
                    } else {
                        narration.push(line.clone());
                    }
                }
            }
        }

        if !narration.is_empty() {
            blocks.push(Block::narration(narration.join("\n")));
        }
        blocks
    }

    /// Flush state at stream end. An unterminated fence degrades to narration.
    pub fn finish(&mut self) -> Vec<Block> {
        match self.fence.take() {
            Some(open) => vec![open.degrade()],
            None => Vec::new(),
        }
    }
}

/// Legacy line-marker scheme: `marker`-prefixed lines are narration (marker
/// stripped); anything else becomes a passthrough block.
#[derive(Debug)]
pub struct MarkerClassifier {
    marker: String,
}

impl MarkerClassifier {
    pub fn new(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
        }
    }

    pub fn push_lines(&mut self, lines: &[String]) -> Vec<Block> {
        let mut blocks = Vec::new();
        let mut narration: Vec<String> = Vec::new();
        let mut passthrough: Vec<String> = Vec::new();

        for line in lines {
            if let Some(rest) = line.strip_prefix(&self.marker) {
                if !passthrough.is_empty() {
                    blocks.push(passthrough_block(&mut passthrough));
                }
                narration.push(rest.trim_start().to_string());
            } else {
                if !narration.is_empty() {
                    blocks.push(Block::narration(narration.join("\n")));
                    narration.clear();
                }
                passthrough.push(line.clone());
            }
        }

        if !narration.is_empty() {
            blocks.push(Block::narration(narration.join("\n")));
        }
        if !passthrough.is_empty() {
            blocks.push(passthrough_block(&mut passthrough));
        }
        blocks
    }

    pub fn finish(&mut self) -> Vec<Block> {
        Vec::new()
    }
}

fn passthrough_block(lines: &mut Vec<String>) -> Block {
    let text = lines.join("\n");
    lines.clear();
    Block {
        kind: BlockKind::Passthrough,
        text,
        language: None,
    }
}

/// Classification scheme selected by configuration. The fenced grammar is
/// canonical; the marker variant is kept for older agent prompts.
#[derive(Debug)]
pub enum Classifier {
    Fenced(FenceClassifier),
    Marker(MarkerClassifier),
}

impl Classifier {
    pub fn push_lines(&mut self, lines: &[String]) -> Vec<Block> {
        match self {
            Classifier::Fenced(inner) => inner.push_lines(lines),
            Classifier::Marker(inner) => inner.push_lines(lines),
        }
    }

    pub fn finish(&mut self) -> Vec<Block> {
        match self {
            Classifier::Fenced(inner) => inner.finish(),
            Classifier::Marker(inner) => inner.finish(),
        }
    }
}
