// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Dense, array-indexable typed ids.
//!
//! [`Id<T>`](crate::Id) is backed by a [`Uuid`](uuid::Uuid), which is the right choice for
//! long-lived, globally-unique handles. Some domains instead need a small, densely packed id
//! (`0..N`) that can be used directly as a `Vec`/array index — group ids, socket ids, and CPU
//! numbers among them. [`DenseId<T>`] fills that role using the same compile-time tagging trick
//! as [`Id<T>`].

use crate::AbstractIdType;
use core::fmt::{Debug, Display, Formatter};

/// A dense, array-indexable id tagged with the type `T` it identifies.
///
/// Unlike [`Id<T>`](crate::Id), values of this type are small integers meant to be used directly
/// as indices into a fixed-size table (e.g. `group_table[gid.index()]`).
pub type DenseId<T> = AbstractIdType<*const T, u32>;

impl<T> DenseId<T> {
    /// Build a `DenseId` from a raw index.
    #[must_use]
    pub const fn from_index(index: u32) -> Self {
        Self(index, core::marker::PhantomData)
    }

    /// Return the wrapped index.
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0
    }

    /// Return the wrapped index as a `usize`, for use as a slice/array index.
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl<T> Display for DenseId<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl<T> Debug for DenseId<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(f, "DenseId({})", self.0)
    }
}

impl<T> From<u32> for DenseId<T> {
    fn from(index: u32) -> Self {
        Self::from_index(index)
    }
}

impl<T> From<DenseId<T>> for u32 {
    fn from(id: DenseId<T>) -> Self {
        id.index()
    }
}

#[cfg(test)]
mod test {
    use super::DenseId;

    struct Group;

    #[test]
    fn round_trips_through_index() {
        let gid: DenseId<Group> = DenseId::from_index(7);
        assert_eq!(gid.index(), 7);
        assert_eq!(gid.as_usize(), 7_usize);
        assert_eq!(format!("{gid}"), "7");
    }

    #[test]
    fn distinct_indices_are_not_equal() {
        let a: DenseId<Group> = DenseId::from_index(1);
        let b: DenseId<Group> = DenseId::from_index(2);
        assert_ne!(a, b);
    }
}
