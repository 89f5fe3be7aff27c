use bitflags::bitflags;

bitflags! {
    /// Flags of one engine order clause. Clauses are applied in the
    /// order they were declared; earlier clauses dominate.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct OrderFlags: u32 {
        /// Sort from high to low.
        const DESCENDING = 1;
        /// Compare strings byte for byte instead of ASCII
        /// case-insensitively.
        const CASE_SENSITIVE = 1 << 1;
        /// Null values come last instead of first.
        const NULLS_LAST = 1 << 2;
        /// Null values compare as zero.
        const NULLS_ZERO = 1 << 3;
        /// Compare integers as unsigned.
        const UNSIGNED = 1 << 4;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bits_are_stable() {
        assert_eq!(OrderFlags::DESCENDING.bits(), 1);
        assert_eq!(OrderFlags::CASE_SENSITIVE.bits(), 2);
        assert_eq!(OrderFlags::NULLS_LAST.bits(), 4);
        assert_eq!(OrderFlags::NULLS_ZERO.bits(), 8);
        assert_eq!(OrderFlags::UNSIGNED.bits(), 16);
    }

    #[test]
    fn flags_compose() {
        let flags = OrderFlags::DESCENDING | OrderFlags::NULLS_LAST;
        assert!(flags.contains(OrderFlags::DESCENDING));
        assert!(!flags.contains(OrderFlags::CASE_SENSITIVE));
    }
}
