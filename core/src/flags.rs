//! The input and output flag words exchanged with the processor core on
//! every [`crate::processor::Processor::execute`] call.
//!
//! Both words are 32-bit, bitfield-addressed exactly like the TMS1100 PLA
//! entry in the teacher codebase -- see `SPEC_FULL.md` §3 for the bit layout.

bitfield::bitfield! {
    /// The input flag word: caller-supplied control bits for one execute cycle.
    #[derive(Clone, Copy, Default, PartialEq, Eq)]
    pub struct InFlags(u32);
    impl Debug;
    /// `CI`: carry in (bit 0).
    pub ci, set_ci: 0;
    /// `P0`: shift-control bit consulted by the SAL/SAR dual-form corner case (bit 1).
    pub p0, set_p0: 1;
    /// `INVPC`: suppress the automatic `Reg[7]` increment (bit 2).
    pub invpc, set_invpc: 2;
    /// `INC`: increment `Reg[7]` by 2 instead of 1 (bit 3).
    pub inc, set_inc: 3;
    /// `PR`: publish `Reg[7]` onto the address bus latch on the next cycle (bit 4).
    pub pr, set_pr: 4;
}

impl InFlags {
    /// Build an input flag word from its raw bit representation.
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Return the raw bit representation of this flag word.
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }
}

bitfield::bitfield! {
    /// The output flag word: observable status bits produced by one execute cycle.
    #[derive(Clone, Copy, Default, PartialEq, Eq)]
    pub struct OutFlags(u32);
    impl Debug;
    /// `CO`: carry out of the top slice (bit 0).
    pub co, set_co: 0;
    /// `INVSL1`: inverted shift-left status for WR (bit 1).
    pub invsl1, set_invsl1: 1;
    /// `INVSR1`: inverted shift-right status for WR (bit 2).
    pub invsr1, set_invsr1: 2;
    /// `INVSL2`: inverted shift-left status for XWR (bit 3).
    pub invsl2, set_invsl2: 3;
    /// `INVSR2`: inverted shift-right status for XWR (bit 4).
    pub invsr2, set_invsr2: 4;
    /// `XWR0`: bottom bit of the previously-latched XWR (bit 5).
    pub xwr0, set_xwr0: 5;
    /// `XWR3`: top bit of the previously-latched XWR (bit 6).
    pub xwr3, set_xwr3: 6;
    /// `A3`: top bit of operand A this cycle (bit 7).
    pub a3, set_a3: 7;
    /// `B3`: top bit of operand B this cycle (bit 8).
    pub b3, set_b3: 8;
    /// `C0`: carry out of the first nibble (bit 9).
    pub c0, set_c0: 9;
    /// `C1`: carry out of the second nibble (bit 10).
    pub c1, set_c1: 10;
    /// `C2`: carry out of the third nibble (bit 11).
    pub c2, set_c2: 11;
    /// `C3`: carry out of the fourth nibble (bit 12).
    pub c3, set_c3: 12;
    /// `C4`: carry out of the fifth nibble, for configurations wider than 16 bits (bit 13).
    pub c4, set_c4: 13;
    /// `C5`: carry out of the sixth nibble (bit 14).
    pub c5, set_c5: 14;
    /// `C6`: carry out of the seventh nibble (bit 15).
    pub c6, set_c6: 15;
    /// `C7`: carry out of the eighth nibble (bit 16).
    pub c7, set_c7: 16;
}

impl OutFlags {
    /// Build an output flag word from its raw bit representation.
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Return the raw bit representation of this flag word.
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Set the carry-out flag of nibble `idx` (`0..=7`).
    ///
    /// # Panics
    ///
    /// If `idx` is greater than 7.
    pub(crate) fn set_nibble_carry(&mut self, idx: usize, value: bool) {
        match idx {
            0 => self.set_c0(value),
            1 => self.set_c1(value),
            2 => self.set_c2(value),
            3 => self.set_c3(value),
            4 => self.set_c4(value),
            5 => self.set_c5(value),
            6 => self.set_c6(value),
            7 => self.set_c7(value),
            _ => panic!("nibble index out of range"),
        }
    }

    /// Read the value of the branch-condition flag in the 12-bit span
    /// `CO..C2`, the only flags the comment parser's `IF` directive can
    /// name (see [`crate::comment`]).
    #[must_use]
    pub(crate) fn branch_bit(self, idx: usize) -> bool {
        self.0 & (1 << idx) != 0
    }
}
