use std::sync::Arc;

/// Descriptor for a compute kernel backing a task.
///
/// Device compilation and argument marshalling live in the device
/// layers; the runtime only needs a handle it can attach to a task and
/// hand back on request.
#[derive(Debug)]
pub struct Kernel {
    name: String,
}

impl Kernel {
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self { name: name.into() })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}
