//! User permissions for encrypted documents (ISO 32000-1 Table 22)

use bitflags::bitflags;

bitflags! {
    /// What an encrypted document allows a user-password holder to do.
    ///
    /// Bit positions follow the PDF `P` entry. The remaining bits of `P`
    /// are fixed by the format (bits 1-2 zero, 7-8 and 13-32 one) and are
    /// applied when converting to and from the stored value.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Permissions: u32 {
        /// Print the document (bit 3).
        const PRINT = 1 << 2;
        /// Modify document contents (bit 4).
        const MODIFY_CONTENTS = 1 << 3;
        /// Copy text and graphics (bit 5).
        const COPY = 1 << 4;
        /// Add or modify annotations (bit 6).
        const MODIFY_ANNOTATIONS = 1 << 5;
        /// Fill in form fields (bit 9).
        const FILL_FORMS = 1 << 8;
        /// Extract content for accessibility (bit 10).
        const ACCESSIBILITY = 1 << 9;
        /// Assemble the document: insert, rotate, delete pages (bit 11).
        const ASSEMBLE = 1 << 10;
        /// Print at full resolution (bit 12).
        const PRINT_HIGH_QUALITY = 1 << 11;
    }
}

/// Bits of `P` that are always set, per the format.
const RESERVED_BITS: u32 = 0xFFFF_F0C0;

impl Permissions {
    /// The stored `P` value: permission bits plus the reserved bits.
    pub fn to_p_value(self) -> i32 {
        (self.bits() | RESERVED_BITS) as i32
    }

    /// Reconstruct from a stored `P` value, discarding reserved bits.
    pub fn from_p_value(p: i32) -> Self {
        Permissions::from_bits_truncate(p as u32)
    }
}

impl Default for Permissions {
    /// Everything prohibited except accessibility extraction.
    fn default() -> Self {
        Permissions::ACCESSIBILITY
    }
}
