use crate::error::ConfigFault;
use crate::ids::HandlerId;

/// An active controller on the stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerFrame {
    pub id: HandlerId,
    pub class: String,
}

/// LIFO of the controllers currently handling a request.
///
/// One stack lives in each [`DispatchContext`](crate::dispatcher::DispatchContext),
/// so concurrent requests never share one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControllerStack {
    frames: Vec<ControllerFrame>,
}

impl ControllerStack {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, id: HandlerId, class: impl Into<String>) {
        self.frames.push(ControllerFrame {
            id,
            class: class.into(),
        });
    }

    /// Pop `id` if it is on top. Anything else leaves the stack untouched and
    /// reports the fault.
    pub fn pop(&mut self, id: HandlerId, class: &str) -> Result<(), ConfigFault> {
        match self.frames.last() {
            Some(top) if top.id == id => {
                self.frames.pop();
                Ok(())
            }
            _ => Err(ConfigFault::StackPopOutOfOrder {
                class: class.to_string(),
            }),
        }
    }

    /// The controller currently on top
    #[must_use]
    pub fn current(&self) -> Option<&ControllerFrame> {
        self.frames.last()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ControllerFrame> {
        self.frames.iter().rev()
    }
}
