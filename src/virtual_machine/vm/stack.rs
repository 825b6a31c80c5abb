use crate::virtual_machine::errors::VMError;

/// Maximum number of entries the operand stack holds.
pub const STACK_CAPACITY: usize = 1024;
/// Width in bytes of every stack slot and register.
pub const SLOT_SIZE: usize = 8;

/// One value on the operand stack.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct StackEntry {
    /// Identifier assigned at push time; never reused within a run.
    pub id: u64,
    /// Width in bytes, always [`SLOT_SIZE`].
    pub size: usize,
    pub value: i64,
}

/// Bounded LIFO operand stack.
///
/// Each successful push receives the next id from a counter starting at 1.
/// Pops do not rewind the counter, so ids strictly increase over a run.
#[derive(Clone, Debug)]
pub struct Stack {
    entries: Vec<StackEntry>,
    next_id: u64,
}

impl Stack {
    pub fn new() -> Self {
        Self {
            entries: Vec::with_capacity(STACK_CAPACITY),
            next_id: 1,
        }
    }

    /// Pushes `value`, returning the id it was given.
    ///
    /// Returns [`VMError::StackOverflow`] when the stack is full.
    pub fn push(&mut self, value: i64) -> Result<u64, VMError> {
        if self.entries.len() >= STACK_CAPACITY {
            return Err(VMError::StackOverflow {
                capacity: STACK_CAPACITY,
            });
        }
        let id = self.next_id;
        self.next_id += 1;
        self.entries.push(StackEntry {
            id,
            size: SLOT_SIZE,
            value,
        });
        Ok(id)
    }

    /// Removes the top entry and returns its value.
    ///
    /// Returns [`VMError::StackUnderflow`] when the stack is empty.
    pub fn pop(&mut self) -> Result<i64, VMError> {
        self.entries
            .pop()
            .map(|entry| entry.value)
            .ok_or(VMError::StackUnderflow)
    }

    /// Entries from bottom to top.
    pub fn entries(&self) -> &[StackEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for Stack {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_pop_lifo() {
        let mut stack = Stack::new();
        stack.push(1).unwrap();
        stack.push(2).unwrap();
        assert_eq!(stack.pop().unwrap(), 2);
        assert_eq!(stack.pop().unwrap(), 1);
        assert!(stack.is_empty());
    }

    #[test]
    fn ids_are_never_reused() {
        let mut stack = Stack::new();
        assert_eq!(stack.push(10).unwrap(), 1);
        assert_eq!(stack.push(20).unwrap(), 2);
        stack.pop().unwrap();
        assert_eq!(stack.push(30).unwrap(), 3);

        let ids: Vec<_> = stack.entries().iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![1, 3]);
        assert!(stack.entries().iter().all(|e| e.size == SLOT_SIZE));
    }

    #[test]
    fn underflow_on_empty() {
        let mut stack = Stack::new();
        assert!(matches!(stack.pop(), Err(VMError::StackUnderflow)));
    }

    #[test]
    fn overflow_at_capacity() {
        let mut stack = Stack::new();
        for i in 0..STACK_CAPACITY {
            stack.push(i as i64).unwrap();
        }
        assert!(matches!(
            stack.push(0),
            Err(VMError::StackOverflow {
                capacity: STACK_CAPACITY
            })
        ));
        assert_eq!(stack.len(), STACK_CAPACITY);
        // a failed push does not consume an id
        stack.pop().unwrap();
        assert_eq!(stack.push(0).unwrap(), STACK_CAPACITY as u64 + 1);
    }
}
