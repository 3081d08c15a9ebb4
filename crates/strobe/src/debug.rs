//! Stage capture for the scheduling pass, for tests and compiler debugging.

/// Checkpoints and per-class/region sizes recorded while scheduling runs
/// with the stats option enabled.
#[derive(Debug, Clone, Default)]
pub struct ScheduleTrace {
    /// Checkpoint names, in pass order
    pub stages: Vec<String>,
    /// Named statement-count sizes, recorded at the owning checkpoint
    pub sizes: Vec<(String, usize)>,
}

impl ScheduleTrace {
    pub fn stage(&mut self, name: &str) {
        self.stages.push(name.to_owned());
    }

    pub fn add_size(&mut self, name: &str, size: usize) {
        self.sizes.push((name.to_owned(), size));
    }

    pub fn size_of(&self, name: &str) -> Option<usize> {
        self.sizes.iter().find(|(n, _)| n == name).map(|(_, s)| *s)
    }

    pub fn print(&self) {
        for stage in &self.stages {
            eprintln!("stage: {stage}");
        }
        for (name, size) in &self.sizes {
            eprintln!("  {name}: {size}");
        }
    }
}
