use std::ops::RangeInclusive;

use crate::error::{ProtoError, Result};

/// Number of addressable needles on the bed.
pub const NEEDLE_COUNT: usize = 200;

/// Bytes in the packed needle bitmask (one bit per needle).
pub const NEEDLE_MASK_LEN: usize = NEEDLE_COUNT / 8;

/// Set of selected needles, stored as the 25-byte wire bitmask.
///
/// Needle `i` is bit `i % 8` of byte `i >> 3`.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct NeedleSelection {
    mask: [u8; NEEDLE_MASK_LEN],
}

impl NeedleSelection {
    /// An empty selection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a selection from needle indices. Fails on the first index
    /// outside `0..=199`.
    pub fn from_needles<I>(needles: I) -> Result<Self>
    where
        I: IntoIterator<Item = usize>,
    {
        let mut selection = Self::new();
        for needle in needles {
            selection.insert(needle)?;
        }
        Ok(selection)
    }

    /// Unpack a wire bitmask. Every mask is valid.
    pub fn from_mask(mask: [u8; NEEDLE_MASK_LEN]) -> Self {
        Self { mask }
    }

    /// Every even needle (0, 2, …, 198).
    pub fn even() -> Self {
        Self::from_mask([0x55; NEEDLE_MASK_LEN])
    }

    /// Every odd needle (1, 3, …, 199).
    pub fn odd() -> Self {
        Self::from_mask([0xAA; NEEDLE_MASK_LEN])
    }

    /// All 200 needles.
    pub fn all() -> Self {
        Self::from_mask([0xFF; NEEDLE_MASK_LEN])
    }

    /// A contiguous run of needles.
    pub fn range(range: RangeInclusive<usize>) -> Result<Self> {
        Self::from_needles(range)
    }

    /// Select a needle. Returns whether it was newly selected.
    pub fn insert(&mut self, needle: usize) -> Result<bool> {
        let (byte, bit) = locate(needle)?;
        let was_set = self.mask[byte] & bit != 0;
        self.mask[byte] |= bit;
        Ok(!was_set)
    }

    /// Deselect a needle. Returns whether it was selected.
    pub fn remove(&mut self, needle: usize) -> Result<bool> {
        let (byte, bit) = locate(needle)?;
        let was_set = self.mask[byte] & bit != 0;
        self.mask[byte] &= !bit;
        Ok(was_set)
    }

    /// Whether a needle is selected. Out-of-range needles never are.
    pub fn contains(&self, needle: usize) -> bool {
        match locate(needle) {
            Ok((byte, bit)) => self.mask[byte] & bit != 0,
            Err(_) => false,
        }
    }

    pub fn len(&self) -> usize {
        self.mask.iter().map(|b| b.count_ones() as usize).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.mask.iter().all(|&b| b == 0)
    }

    /// Selected needles in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        (0..NEEDLE_COUNT).filter(move |&needle| self.mask[needle >> 3] & (1 << (needle % 8)) != 0)
    }

    /// The packed wire form.
    pub fn to_mask(&self) -> [u8; NEEDLE_MASK_LEN] {
        self.mask
    }

    pub fn as_mask(&self) -> &[u8; NEEDLE_MASK_LEN] {
        &self.mask
    }
}

fn locate(needle: usize) -> Result<(usize, u8)> {
    if needle >= NEEDLE_COUNT {
        return Err(ProtoError::NeedleOutOfRange { needle });
    }
    Ok((needle >> 3, 1 << (needle % 8)))
}

impl std::fmt::Debug for NeedleSelection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for NeedleSelection {
    fn serialize<S: serde::Serializer>(
        &self,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use proptest::prelude::*;

    use super::*;

    #[test]
    fn packs_known_needles() {
        let selection = NeedleSelection::from_needles([83, 99, 100, 116]).unwrap();
        let mask = selection.to_mask();

        let mut expected = [0u8; NEEDLE_MASK_LEN];
        expected[10] = 1 << 3;
        expected[12] = (1 << 3) | (1 << 4);
        expected[14] = 1 << 4;
        assert_eq!(mask, expected);
        assert_eq!(selection.len(), 4);
    }

    #[test]
    fn out_of_range_needle_fails() {
        let mut selection = NeedleSelection::new();
        assert_eq!(
            selection.insert(200),
            Err(ProtoError::NeedleOutOfRange { needle: 200 })
        );
        assert!(NeedleSelection::from_needles([1, 2, 250]).is_err());
        assert!(selection.remove(999).is_err());
        assert!(!selection.contains(200));
        assert!(selection.is_empty());
    }

    #[test]
    fn boundary_needles() {
        let selection = NeedleSelection::from_needles([0, 199]).unwrap();
        assert_eq!(selection.as_mask()[0], 0x01);
        assert_eq!(selection.as_mask()[24], 0x80);
        assert_eq!(selection.iter().collect::<Vec<_>>(), vec![0, 199]);
    }

    #[test]
    fn insert_and_remove_report_changes() {
        let mut selection = NeedleSelection::new();
        assert!(selection.insert(42).unwrap());
        assert!(!selection.insert(42).unwrap());
        assert!(selection.contains(42));
        assert!(selection.remove(42).unwrap());
        assert!(!selection.remove(42).unwrap());
        assert!(selection.is_empty());
    }

    #[test]
    fn patterns() {
        let odd = NeedleSelection::odd();
        let even = NeedleSelection::even();
        assert_eq!(odd.len(), 100);
        assert_eq!(even.len(), 100);
        assert!(odd.iter().all(|n| n % 2 == 1));
        assert!(even.iter().all(|n| n % 2 == 0));
        assert_eq!(NeedleSelection::all().len(), NEEDLE_COUNT);

        let run = NeedleSelection::range(70..=129).unwrap();
        assert_eq!(run.len(), 60);
        assert_eq!(run.iter().next(), Some(70));
        assert_eq!(run.iter().last(), Some(129));
        assert!(NeedleSelection::range(190..=200).is_err());
    }

    proptest! {
        #[test]
        fn mask_roundtrip(needles in proptest::collection::btree_set(0usize..NEEDLE_COUNT, 0..NEEDLE_COUNT)) {
            let selection = NeedleSelection::from_needles(needles.iter().copied()).unwrap();
            let unpacked = NeedleSelection::from_mask(selection.to_mask());
            let recovered: BTreeSet<usize> = unpacked.iter().collect();
            prop_assert_eq!(recovered, needles);
        }

        #[test]
        fn any_mask_is_valid(mask in proptest::array::uniform25(any::<u8>())) {
            let selection = NeedleSelection::from_mask(mask);
            let rebuilt = NeedleSelection::from_needles(selection.iter()).unwrap();
            prop_assert_eq!(rebuilt.to_mask(), mask);
        }
    }
}
