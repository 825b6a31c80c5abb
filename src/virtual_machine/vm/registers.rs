use crate::virtual_machine::errors::VMError;

/// Number of general-purpose registers.
pub const REGISTER_COUNT: usize = 16;

/// Register names in declaration order; this is also the trace order.
pub const REGISTER_NAMES: [&str; REGISTER_COUNT] = [
    "rax", "rbx", "rcx", "rdx", "rsi", "rdi", "rbp", "rsp", "r8", "r9", "r10", "r11", "r12",
    "r13", "r14", "r15",
];

/// Returns the declaration index of a register name, if it is one.
pub fn register_index(name: &str) -> Option<usize> {
    REGISTER_NAMES.iter().position(|reg| *reg == name)
}

/// Register file of sixteen named 64-bit signed registers.
///
/// The name set is fixed; every register starts at zero.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Registers {
    regs: [i64; REGISTER_COUNT],
}

impl Registers {
    /// Creates a register file with every register set to zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value of register `name`.
    ///
    /// Returns [`VMError::UnknownRegister`] if `name` is not a register.
    pub fn get(&self, name: &str) -> Result<i64, VMError> {
        register_index(name)
            .map(|idx| self.regs[idx])
            .ok_or_else(|| VMError::UnknownRegister {
                name: name.to_string(),
            })
    }

    /// Stores `value` into register `name`.
    ///
    /// Returns [`VMError::UnknownRegister`] if `name` is not a register.
    pub fn set(&mut self, name: &str, value: i64) -> Result<(), VMError> {
        let idx = register_index(name).ok_or_else(|| VMError::UnknownRegister {
            name: name.to_string(),
        })?;
        self.regs[idx] = value;
        Ok(())
    }

    /// Iterates `(name, value)` pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, i64)> + '_ {
        REGISTER_NAMES.iter().copied().zip(self.regs.iter().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_zeroed_in_declaration_order() {
        let regs = Registers::new();
        let names: Vec<_> = regs.iter().map(|(name, _)| name).collect();
        assert_eq!(names, REGISTER_NAMES);
        assert!(regs.iter().all(|(_, value)| value == 0));
    }

    #[test]
    fn get_and_set_by_name() {
        let mut regs = Registers::new();
        regs.set("r13", -5).unwrap();
        regs.set("rax", 9).unwrap();
        assert_eq!(regs.get("r13").unwrap(), -5);
        assert_eq!(regs.get("rax").unwrap(), 9);
        assert_eq!(regs.get("rbx").unwrap(), 0);
    }

    #[test]
    fn unknown_names_rejected() {
        let mut regs = Registers::new();
        for name in ["eax", "RAX", "r16", "", "5"] {
            assert!(matches!(
                regs.get(name),
                Err(VMError::UnknownRegister { .. })
            ));
            assert!(matches!(
                regs.set(name, 1),
                Err(VMError::UnknownRegister { .. })
            ));
        }
        assert_eq!(regs, Registers::new());
    }

    #[test]
    fn register_index_matches_position() {
        assert_eq!(register_index("rax"), Some(0));
        assert_eq!(register_index("rsp"), Some(7));
        assert_eq!(register_index("r15"), Some(15));
        assert_eq!(register_index("rip"), None);
    }
}
