//! The interpreter heap.
//!
//! Objects live in an arena and are never freed. A reference is an
//! [`Address`]: an object id plus a byte offset into that object, so every
//! load and store is checked against the object it targets.
//!
//! Memory layout inside an object:
//! - an int occupies 4 bytes, little-endian;
//! - a reference occupies 8 bytes, object id then offset (both u32
//!   little-endian), and all-zero bytes mean null, so fresh memory reads
//!   back as null;
//! - a char occupies 1 byte.

use stackvm_common::{Address, ObjectId};
use thiserror::Error;
use tracing::debug;

/// Bytes occupied by an int slot.
pub const INT_SIZE: usize = 4;

/// Bytes occupied by a reference slot.
pub const REF_SIZE: usize = 8;

/// Default allocation budget: 1 GiB.
pub const DEFAULT_MAX_HEAP_BYTES: usize = 1 << 30;

/// Errors from heap access and allocation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HeapError {
    #[error("null reference")]
    NullReference,

    #[error("reference to unknown object #{0}")]
    DanglingReference(u32),

    #[error("{width}-byte access at offset {offset} is outside object #{object} ({size} bytes)")]
    OutOfBounds {
        object: u32,
        offset: u32,
        width: usize,
        size: usize,
    },

    #[error("object #{0} is read-only")]
    ReadOnly(u32),

    #[error("reference into object #{0} is not an array")]
    NotAnArray(u32),

    #[error("index {index} not valid for array of length {count}")]
    IndexOutOfRange { index: i32, count: u32 },

    #[error("negative array size {0}")]
    NegativeCount(i32),

    #[error("allocation of {requested} byte(s) exceeds the remaining {available} byte(s)")]
    OutOfMemory { requested: usize, available: usize },
}

/// A heap object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Object {
    /// Storage from NEW.
    Block(Vec<u8>),
    /// Storage from NEWARRAY: `count` elements of `elem_size` bytes each.
    Array {
        elem_size: u8,
        count: u32,
        bytes: Vec<u8>,
    },
    /// The program's string pool. Read-only.
    Strings(Vec<u8>),
}

impl Object {
    pub fn bytes(&self) -> &[u8] {
        match self {
            Object::Block(bytes) | Object::Strings(bytes) | Object::Array { bytes, .. } => bytes,
        }
    }

    fn bytes_mut(&mut self) -> Option<&mut [u8]> {
        match self {
            Object::Block(bytes) | Object::Array { bytes, .. } => Some(bytes.as_mut_slice()),
            Object::Strings(_) => None,
        }
    }
}

/// Arena of objects with an allocation budget.
#[derive(Debug, Clone)]
pub struct Heap {
    objects: Vec<Object>,
    allocated: usize,
    max_bytes: usize,
}

impl Default for Heap {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HEAP_BYTES)
    }
}

impl Heap {
    /// Create an empty heap that allows `max_bytes` of allocation.
    pub fn new(max_bytes: usize) -> Self {
        Self {
            objects: Vec::new(),
            allocated: 0,
            max_bytes,
        }
    }

    /// Bytes handed out by NEW and NEWARRAY so far.
    pub fn allocated_bytes(&self) -> usize {
        self.allocated
    }

    /// Number of live objects, the string pool included.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn object(&self, id: ObjectId) -> Result<&Object, HeapError> {
        self.objects
            .get(id.get() as usize - 1)
            .ok_or(HeapError::DanglingReference(id.get()))
    }

    fn object_mut(&mut self, id: ObjectId) -> Result<&mut Object, HeapError> {
        self.objects
            .get_mut(id.get() as usize - 1)
            .ok_or(HeapError::DanglingReference(id.get()))
    }

    fn insert(&mut self, object: Object) -> Result<ObjectId, HeapError> {
        let id = u32::try_from(self.objects.len() + 1)
            .ok()
            .and_then(ObjectId::new)
            .ok_or(HeapError::OutOfMemory {
                requested: object.bytes().len(),
                available: 0,
            })?;
        self.objects.push(object);
        Ok(id)
    }

    /// Charge `requested` bytes against the budget.
    fn reserve(&mut self, requested: usize) -> Result<(), HeapError> {
        let available = self.max_bytes.saturating_sub(self.allocated);
        // Offsets are u32, so no single object may outgrow that range.
        if requested > available || requested > u32::MAX as usize {
            return Err(HeapError::OutOfMemory {
                requested,
                available,
            });
        }
        self.allocated += requested;
        Ok(())
    }

    /// Allocate `size` zeroed bytes.
    pub fn alloc_block(&mut self, size: usize) -> Result<Address, HeapError> {
        self.reserve(size)?;
        let id = self.insert(Object::Block(vec![0; size]))?;
        debug!(object = id.get(), size, "alloc block");
        Ok(Address::start(id))
    }

    /// Allocate a zeroed array of `count` elements of `elem_size` bytes.
    pub fn alloc_array(&mut self, count: i32, elem_size: u8) -> Result<Address, HeapError> {
        let count = u32::try_from(count).map_err(|_| HeapError::NegativeCount(count))?;
        let size = (count as usize)
            .checked_mul(elem_size as usize)
            .ok_or(HeapError::OutOfMemory {
                requested: usize::MAX,
                available: self.max_bytes.saturating_sub(self.allocated),
            })?;
        self.reserve(size)?;
        let id = self.insert(Object::Array {
            elem_size,
            count,
            bytes: vec![0; size],
        })?;
        debug!(object = id.get(), count, elem_size, "alloc array");
        Ok(Address::start(id))
    }

    /// Install the program's string pool as a read-only object.
    ///
    /// The pool does not count against the allocation budget.
    pub fn install_strings(&mut self, bytes: Vec<u8>) -> Result<ObjectId, HeapError> {
        self.insert(Object::Strings(bytes))
    }

    fn resolve(r: Option<Address>) -> Result<Address, HeapError> {
        r.ok_or(HeapError::NullReference)
    }

    fn out_of_bounds(addr: Address, width: usize, size: usize) -> HeapError {
        HeapError::OutOfBounds {
            object: addr.object.get(),
            offset: addr.offset,
            width,
            size,
        }
    }

    fn slice(&self, r: Option<Address>, width: usize) -> Result<&[u8], HeapError> {
        let addr = Self::resolve(r)?;
        let bytes = self.object(addr.object)?.bytes();
        let start = addr.offset as usize;
        bytes
            .get(start..start + width)
            .ok_or_else(|| Self::out_of_bounds(addr, width, bytes.len()))
    }

    fn slice_mut(&mut self, r: Option<Address>, width: usize) -> Result<&mut [u8], HeapError> {
        let addr = Self::resolve(r)?;
        let bytes = self
            .object_mut(addr.object)?
            .bytes_mut()
            .ok_or(HeapError::ReadOnly(addr.object.get()))?;
        let size = bytes.len();
        let start = addr.offset as usize;
        bytes
            .get_mut(start..start + width)
            .ok_or_else(|| Self::out_of_bounds(addr, width, size))
    }

    pub fn load_int(&self, r: Option<Address>) -> Result<i32, HeapError> {
        let bytes = self.slice(r, INT_SIZE)?;
        Ok(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn store_int(&mut self, r: Option<Address>, value: i32) -> Result<(), HeapError> {
        self.slice_mut(r, INT_SIZE)?
            .copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    pub fn load_ref(&self, r: Option<Address>) -> Result<Option<Address>, HeapError> {
        let bytes = self.slice(r, REF_SIZE)?;
        let object = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        let offset = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        Ok(ObjectId::new(object).map(|object| Address { object, offset }))
    }

    pub fn store_ref(
        &mut self,
        r: Option<Address>,
        value: Option<Address>,
    ) -> Result<(), HeapError> {
        let slot = self.slice_mut(r, REF_SIZE)?;
        match value {
            Some(addr) => {
                slot[..4].copy_from_slice(&addr.object.get().to_le_bytes());
                slot[4..].copy_from_slice(&addr.offset.to_le_bytes());
            }
            None => slot.fill(0),
        }
        Ok(())
    }

    pub fn load_byte(&self, r: Option<Address>) -> Result<u8, HeapError> {
        Ok(self.slice(r, 1)?[0])
    }

    pub fn store_byte(&mut self, r: Option<Address>, value: u8) -> Result<(), HeapError> {
        self.slice_mut(r, 1)?[0] = value;
        Ok(())
    }

    /// Address `offset` bytes past `r`.
    ///
    /// Only null is rejected here; the resulting address is bounds-checked
    /// when it is dereferenced.
    pub fn field(&self, r: Option<Address>, offset: u8) -> Result<Address, HeapError> {
        let addr = Self::resolve(r)?;
        let size = self.object(addr.object)?.bytes().len();
        let offset = addr
            .offset
            .checked_add(offset as u32)
            .ok_or_else(|| Self::out_of_bounds(addr, offset as usize, size))?;
        Ok(Address {
            object: addr.object,
            offset,
        })
    }

    fn array(&self, r: Option<Address>) -> Result<(Address, u8, u32), HeapError> {
        let addr = Self::resolve(r)?;
        match self.object(addr.object)? {
            Object::Array {
                elem_size, count, ..
            } if addr.offset == 0 => Ok((addr, *elem_size, *count)),
            _ => Err(HeapError::NotAnArray(addr.object.get())),
        }
    }

    /// Element count of the array `r` points to.
    pub fn array_len(&self, r: Option<Address>) -> Result<u32, HeapError> {
        self.array(r).map(|(_, _, count)| count)
    }

    /// Address of element `index` of the array `r` points to.
    pub fn element(&self, r: Option<Address>, index: i32) -> Result<Address, HeapError> {
        let (addr, elem_size, count) = self.array(r)?;
        match u32::try_from(index) {
            // count * elem_size fits in u32, checked at allocation.
            Ok(i) if i < count => Ok(Address {
                object: addr.object,
                offset: i * elem_size as u32,
            }),
            _ => Err(HeapError::IndexOutOfRange { index, count }),
        }
    }

    /// Bytes from `r` up to (not including) the first NUL, or to the end
    /// of the object if there is none.
    pub fn c_str(&self, r: Option<Address>) -> Result<&[u8], HeapError> {
        let addr = Self::resolve(r)?;
        let bytes = self.object(addr.object)?.bytes();
        let start = addr.offset as usize;
        if start >= bytes.len() {
            return Err(Self::out_of_bounds(addr, 1, bytes.len()));
        }
        let tail = &bytes[start..];
        let end = tail.iter().position(|&b| b == 0).unwrap_or(tail.len());
        Ok(&tail[..end])
    }
}
