use std::fmt;

/*
The ten opcodes below are exactly the original's p-code instruction set
(§6.2): a stack machine with lexical-level-relative addressing for `lod`/
`sto`, absolute jump targets for `jmp`/`jpc`, and `cal` kept in the set even
though nothing in this compiler ever emits it (there are no procedures).
*/

/// One of the ten p-code opcodes. The numeric values in `as_code`/`from_code`
/// are the wire-format integers (§6.2) — they are not derived from enum
/// discriminants so that reordering variants here can never silently change
/// the emitted bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Lit,
    Opr,
    Lod,
    Sto,
    Cal,
    Inc,
    Jmp,
    Jpc,
    Sio,
    Read,
}

impl Opcode {
    pub fn as_code(self) -> i64 {
        match self {
            Opcode::Lit => 1,
            Opcode::Opr => 2,
            Opcode::Lod => 3,
            Opcode::Sto => 4,
            Opcode::Cal => 5,
            Opcode::Inc => 6,
            Opcode::Jmp => 7,
            Opcode::Jpc => 8,
            Opcode::Sio => 9,
            Opcode::Read => 10,
        }
    }

    pub fn from_code(code: i64) -> Option<Opcode> {
        Some(match code {
            1 => Opcode::Lit,
            2 => Opcode::Opr,
            3 => Opcode::Lod,
            4 => Opcode::Sto,
            5 => Opcode::Cal,
            6 => Opcode::Inc,
            7 => Opcode::Jmp,
            8 => Opcode::Jpc,
            9 => Opcode::Sio,
            10 => Opcode::Read,
            _ => return None,
        })
    }

    fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Lit => "lit",
            Opcode::Opr => "opr",
            Opcode::Lod => "lod",
            Opcode::Sto => "sto",
            Opcode::Cal => "cal",
            Opcode::Inc => "inc",
            Opcode::Jmp => "jmp",
            Opcode::Jpc => "jpc",
            Opcode::Sio => "sio",
            Opcode::Read => "read",
        }
    }
}

/// The `opr` instruction's modifier values (§6.2): which ALU/comparison
/// operation to perform. Only meaningful when `Instruction.opcode == Opr`.
pub mod opr {
    pub const RETURN: i64 = 0;
    pub const NEGATE: i64 = 1;
    pub const ADD: i64 = 2;
    pub const SUBTRACT: i64 = 3;
    pub const MULTIPLY: i64 = 4;
    pub const DIVIDE: i64 = 5;
    pub const ODD: i64 = 6;
    pub const EQ: i64 = 8;
    pub const NEQ: i64 = 9;
    pub const LT: i64 = 10;
    pub const LEQ: i64 = 11;
    pub const GT: i64 = 12;
    pub const GEQ: i64 = 13;
}

/// A single p-code instruction: opcode, lexical level, and a
/// modifier/operand whose meaning depends on the opcode (a literal value for
/// `lit`, an ALU selector for `opr`, a symbol's address for `lod`/`sto`, a
/// jump target for `jmp`/`jpc`, an IO channel for `sio`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    pub opcode: Opcode,
    pub level: i64,
    pub modifier: i64,
}

impl Instruction {
    pub fn new(opcode: Opcode, level: i64, modifier: i64) -> Self {
        Self {
            opcode,
            level,
            modifier,
        }
    }
}

/// The wire format (§6.2): three space-separated integers, one instruction
/// per line. This is exactly what verbosity 0 prints and all a downstream VM
/// needs to parse.
impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {} {}", self.opcode.as_code(), self.level, self.modifier)
    }
}

/// Renders an instruction with its mnemonic instead of the numeric opcode,
/// for verbosity >= 1 (§6.4). Kept separate from `Display` since the wire
/// format and the human-readable form are different contracts.
pub fn pretty(instruction: &Instruction) -> String {
    format!(
        "{} {} {}",
        instruction.opcode.mnemonic(),
        instruction.level,
        instruction.modifier
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcode_round_trips_through_wire_code() {
        for opcode in [
            Opcode::Lit,
            Opcode::Opr,
            Opcode::Lod,
            Opcode::Sto,
            Opcode::Cal,
            Opcode::Inc,
            Opcode::Jmp,
            Opcode::Jpc,
            Opcode::Sio,
            Opcode::Read,
        ] {
            assert_eq!(Opcode::from_code(opcode.as_code()), Some(opcode));
        }
    }

    #[test]
    fn display_prints_wire_format() {
        let instr = Instruction::new(Opcode::Lit, 0, 5);
        assert_eq!(instr.to_string(), "1 0 5");
    }

    #[test]
    fn pretty_prints_mnemonic() {
        let instr = Instruction::new(Opcode::Jpc, 0, 12);
        assert_eq!(pretty(&instr), "jpc 0 12");
    }

    /// Printing a sequence of instructions in the §6.2 wire format and
    /// parsing each line back into (opcode, level, modifier) must reproduce
    /// the original instructions exactly — the contract the downstream VM
    /// relies on.
    #[test]
    fn instruction_print_round_trips() {
        let instructions = vec![
            Instruction::new(Opcode::Lit, 0, 5),
            Instruction::new(Opcode::Opr, 0, opr::NEGATE),
            Instruction::new(Opcode::Lod, 0, 3),
            Instruction::new(Opcode::Sto, 0, 2),
            Instruction::new(Opcode::Inc, 0, 4),
            Instruction::new(Opcode::Jmp, 0, 7),
            Instruction::new(Opcode::Jpc, 0, 9),
            Instruction::new(Opcode::Sio, 0, 1),
            Instruction::new(Opcode::Read, 0, 2),
        ];

        let printed: Vec<String> = instructions.iter().map(Instruction::to_string).collect();
        let parsed: Vec<Instruction> = printed
            .iter()
            .map(|line| {
                let mut parts = line.split_whitespace();
                let opcode = Opcode::from_code(parts.next().unwrap().parse().unwrap()).unwrap();
                let level = parts.next().unwrap().parse().unwrap();
                let modifier = parts.next().unwrap().parse().unwrap();
                assert!(parts.next().is_none());
                Instruction::new(opcode, level, modifier)
            })
            .collect();

        assert_eq!(parsed, instructions);
    }
}
