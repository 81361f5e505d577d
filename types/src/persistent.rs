//! Copy-on-write SSZ collections.
//!
//! Both collections wrap [`im::Vector`], so cloning a state is cheap and a mutation only copies
//! the chunk containing the modified element. Hashing follows SSZ merkleization for lists and
//! vectors. Roots are recomputed on every call.

use core::{
    fmt::{Debug, Formatter, Result as FmtResult},
    marker::PhantomData,
};

use derivative::Derivative;
use im::Vector;
use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};
use ssz::{Decode, DecodeError, Encode, SszEncoder, BYTES_PER_LENGTH_OFFSET};
use tree_hash::{mix_in_length, Hash256, MerkleHasher, PackedEncoding, TreeHash, TreeHashType};
use typenum::Unsigned;

use crate::error::{IndexError, PushError, ReadError};

#[derive(Derivative)]
#[derivative(
    Clone(bound = "T: Clone"),
    PartialEq(bound = "T: Clone + PartialEq"),
    Eq(bound = "T: Clone + Eq"),
    Default(bound = "T: Clone")
)]
pub struct PersistentList<T: Clone, N> {
    elements: Vector<T>,
    phantom: PhantomData<N>,
}

impl<T: Clone + Debug, N> Debug for PersistentList<T, N> {
    fn fmt(&self, formatter: &mut Formatter) -> FmtResult {
        formatter.debug_list().entries(&self.elements).finish()
    }
}

impl<'list, T: Clone, N> IntoIterator for &'list PersistentList<T, N> {
    type Item = &'list T;
    type IntoIter = im::vector::Iter<'list, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.iter()
    }
}

impl<T: Clone, N: Unsigned> PersistentList<T, N> {
    pub fn try_from_iter(elements: impl IntoIterator<Item = T>) -> Result<Self, ReadError> {
        let elements = elements.into_iter().collect::<Vector<_>>();

        if elements.len() > N::USIZE {
            return Err(ReadError::ListTooLong {
                maximum: N::USIZE,
                actual: elements.len(),
            });
        }

        Ok(Self {
            elements,
            phantom: PhantomData,
        })
    }

    /// Builds a list of `length` default values, such as an empty participation record.
    pub fn repeat_default(length: usize) -> Result<Self, ReadError>
    where
        T: Default,
    {
        Self::try_from_iter(core::iter::repeat_n(T::default(), length))
    }

    pub fn push(&mut self, element: T) -> Result<(), PushError> {
        if self.elements.len() >= N::USIZE {
            return Err(PushError::ListFull { maximum: N::USIZE });
        }

        self.elements.push_back(element);

        Ok(())
    }
}

impl<T: Clone, N> PersistentList<T, N> {
    #[must_use]
    pub fn len_usize(&self) -> usize {
        self.elements.len()
    }

    #[must_use]
    pub fn len_u64(&self) -> u64 {
        self.elements.len() as u64
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn get(&self, index: u64) -> Result<&T, IndexError> {
        let index = validate_index(self.elements.len(), index)?;
        Ok(&self.elements[index])
    }

    pub fn get_mut(&mut self, index: u64) -> Result<&mut T, IndexError> {
        let index = validate_index(self.elements.len(), index)?;
        Ok(&mut self.elements[index])
    }

    /// Applies `updater` to every element.
    ///
    /// Chunks whose elements are left unchanged stay shared with other copies of the list.
    pub fn update(&mut self, mut updater: impl FnMut(&mut T))
    where
        T: PartialEq,
    {
        for index in 0..self.elements.len() {
            let mut element = self.elements[index].clone();

            updater(&mut element);

            if element != self.elements[index] {
                self.elements[index] = element;
            }
        }
    }

    pub fn iter(&self) -> im::vector::Iter<'_, T> {
        self.elements.iter()
    }

    #[must_use]
    pub fn last(&self) -> Option<&T> {
        self.elements.last()
    }
}

impl<T: Clone + TreeHash, N: Unsigned> TreeHash for PersistentList<T, N> {
    fn tree_hash_type() -> TreeHashType {
        TreeHashType::List
    }

    fn tree_hash_packed_encoding(&self) -> PackedEncoding {
        unreachable!("lists are never packed")
    }

    fn tree_hash_packing_factor() -> usize {
        unreachable!("lists are never packed")
    }

    fn tree_hash_root(&self) -> Hash256 {
        let root = merkleize(&self.elements, N::USIZE);
        mix_in_length(&root, self.elements.len())
    }
}

impl<T: Clone + Encode, N> Encode for PersistentList<T, N> {
    fn is_ssz_fixed_len() -> bool {
        false
    }

    fn ssz_bytes_len(&self) -> usize {
        encoded_length(&self.elements)
    }

    fn ssz_append(&self, buffer: &mut Vec<u8>) {
        encode_elements(&self.elements, buffer);
    }
}

impl<T: Clone + Decode, N: Unsigned> Decode for PersistentList<T, N> {
    fn is_ssz_fixed_len() -> bool {
        false
    }

    fn from_ssz_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        let elements = Vec::<T>::from_ssz_bytes(bytes)?;
        Self::try_from_iter(elements).map_err(|error| DecodeError::BytesInvalid(error.to_string()))
    }
}

impl<T: Clone + Serialize, N> Serialize for PersistentList<T, N> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(&self.elements)
    }
}

impl<'de, T: Clone + Deserialize<'de>, N: Unsigned> Deserialize<'de> for PersistentList<T, N> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let elements = Vec::<T>::deserialize(deserializer)?;
        Self::try_from_iter(elements).map_err(D::Error::custom)
    }
}

#[derive(Derivative)]
#[derivative(
    Clone(bound = "T: Clone"),
    PartialEq(bound = "T: Clone + PartialEq"),
    Eq(bound = "T: Clone + Eq")
)]
pub struct PersistentVector<T: Clone, N> {
    elements: Vector<T>,
    phantom: PhantomData<N>,
}

impl<T: Clone + Default, N: Unsigned> Default for PersistentVector<T, N> {
    fn default() -> Self {
        Self::repeat_element(T::default())
    }
}

impl<T: Clone + Debug, N> Debug for PersistentVector<T, N> {
    fn fmt(&self, formatter: &mut Formatter) -> FmtResult {
        formatter.debug_list().entries(&self.elements).finish()
    }
}

impl<'vector, T: Clone, N> IntoIterator for &'vector PersistentVector<T, N> {
    type Item = &'vector T;
    type IntoIter = im::vector::Iter<'vector, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.iter()
    }
}

impl<T: Clone, N: Unsigned> PersistentVector<T, N> {
    #[must_use]
    pub fn repeat_element(element: T) -> Self {
        Self {
            elements: core::iter::repeat_n(element, N::USIZE).collect(),
            phantom: PhantomData,
        }
    }

    pub fn try_from_iter(elements: impl IntoIterator<Item = T>) -> Result<Self, ReadError> {
        let elements = elements.into_iter().collect::<Vector<_>>();

        if elements.len() != N::USIZE {
            return Err(ReadError::VectorSizeMismatch {
                expected: N::USIZE,
                actual: elements.len(),
            });
        }

        Ok(Self {
            elements,
            phantom: PhantomData,
        })
    }

    /// Returns the element at `index` modulo the length of the vector.
    #[must_use]
    pub fn mod_index(&self, index: u64) -> &T {
        &self.elements[Self::reduce(index)]
    }

    pub fn mod_index_mut(&mut self, index: u64) -> &mut T {
        &mut self.elements[Self::reduce(index)]
    }

    pub fn update(&mut self, mut updater: impl FnMut(&mut T))
    where
        T: PartialEq,
    {
        for index in 0..N::USIZE {
            let mut element = self.elements[index].clone();

            updater(&mut element);

            if element != self.elements[index] {
                self.elements[index] = element;
            }
        }
    }

    pub fn iter(&self) -> im::vector::Iter<'_, T> {
        self.elements.iter()
    }

    fn reduce(index: u64) -> usize {
        // The remainder is smaller than `N`, which is a `usize`.
        (index % N::U64) as usize
    }
}

impl<T: Clone + TreeHash, N: Unsigned> TreeHash for PersistentVector<T, N> {
    fn tree_hash_type() -> TreeHashType {
        TreeHashType::Vector
    }

    fn tree_hash_packed_encoding(&self) -> PackedEncoding {
        unreachable!("vectors are never packed")
    }

    fn tree_hash_packing_factor() -> usize {
        unreachable!("vectors are never packed")
    }

    fn tree_hash_root(&self) -> Hash256 {
        merkleize(&self.elements, N::USIZE)
    }
}

impl<T: Clone + Encode, N: Unsigned> Encode for PersistentVector<T, N> {
    fn is_ssz_fixed_len() -> bool {
        T::is_ssz_fixed_len()
    }

    fn ssz_fixed_len() -> usize {
        if T::is_ssz_fixed_len() {
            T::ssz_fixed_len() * N::USIZE
        } else {
            BYTES_PER_LENGTH_OFFSET
        }
    }

    fn ssz_bytes_len(&self) -> usize {
        encoded_length(&self.elements)
    }

    fn ssz_append(&self, buffer: &mut Vec<u8>) {
        encode_elements(&self.elements, buffer);
    }
}

impl<T: Clone + Decode, N: Unsigned> Decode for PersistentVector<T, N> {
    fn is_ssz_fixed_len() -> bool {
        T::is_ssz_fixed_len()
    }

    fn ssz_fixed_len() -> usize {
        if T::is_ssz_fixed_len() {
            T::ssz_fixed_len() * N::USIZE
        } else {
            BYTES_PER_LENGTH_OFFSET
        }
    }

    fn from_ssz_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        let elements = Vec::<T>::from_ssz_bytes(bytes)?;
        Self::try_from_iter(elements).map_err(|error| DecodeError::BytesInvalid(error.to_string()))
    }
}

impl<T: Clone + Serialize, N> Serialize for PersistentVector<T, N> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(&self.elements)
    }
}

impl<'de, T: Clone + Deserialize<'de>, N: Unsigned> Deserialize<'de> for PersistentVector<T, N> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let elements = Vec::<T>::deserialize(deserializer)?;
        Self::try_from_iter(elements).map_err(D::Error::custom)
    }
}

fn validate_index(length: usize, index: u64) -> Result<usize, IndexError> {
    let index = index
        .try_into()
        .map_err(|_| IndexError::DoesNotFitInUsize { index })?;

    if index < length {
        Ok(index)
    } else {
        Err(IndexError::OutOfBounds { length, index })
    }
}

fn merkleize<T: Clone + TreeHash>(elements: &Vector<T>, maximum_length: usize) -> Hash256 {
    match T::tree_hash_type() {
        TreeHashType::Basic => {
            let packing_factor = T::tree_hash_packing_factor();
            let mut hasher = MerkleHasher::with_leaves(maximum_length.div_ceil(packing_factor));

            for element in elements {
                hasher
                    .write(&element.tree_hash_packed_encoding())
                    .expect("collection length is bounded by the number of leaves");
            }

            hasher
                .finish()
                .expect("collection length is bounded by the number of leaves")
        }
        TreeHashType::Container | TreeHashType::List | TreeHashType::Vector => {
            let mut hasher = MerkleHasher::with_leaves(maximum_length);

            for element in elements {
                hasher
                    .write(element.tree_hash_root().as_slice())
                    .expect("collection length is bounded by the number of leaves");
            }

            hasher
                .finish()
                .expect("collection length is bounded by the number of leaves")
        }
    }
}

fn encoded_length<T: Clone + Encode>(elements: &Vector<T>) -> usize {
    if T::is_ssz_fixed_len() {
        T::ssz_fixed_len() * elements.len()
    } else {
        elements
            .iter()
            .map(|element| element.ssz_bytes_len() + BYTES_PER_LENGTH_OFFSET)
            .sum()
    }
}

fn encode_elements<T: Clone + Encode>(elements: &Vector<T>, buffer: &mut Vec<u8>) {
    if T::is_ssz_fixed_len() {
        buffer.reserve(T::ssz_fixed_len() * elements.len());

        for element in elements {
            element.ssz_append(buffer);
        }
    } else {
        let mut encoder = SszEncoder::container(buffer, elements.len() * BYTES_PER_LENGTH_OFFSET);

        for element in elements {
            encoder.append(element);
        }

        encoder.finalize();
    }
}
