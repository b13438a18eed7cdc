// renderer/uniforms.rs
//! Reflected uniform descriptions and the per-material value store.
//!
//! A [`UniformSchema`] is produced once per shader program by reflection (see
//! [`crate::renderer::shader`]). A [`UniformStore`] holds one typed value for
//! every schema entry and is uploaded by the device at draw time.

use std::collections::BTreeMap;
use std::fmt;

use glam::{Mat4, Vec3};

/// Underlying type of a uniform entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniformType {
    Float,
    Int,
    Vec3,
    Mat4,
    /// A texture binding; its value is the texture unit it samples from.
    Sampler,
}

impl UniformType {
    /// Size in bytes when packed into a uniform block. Samplers live outside
    /// the block and have no packed size.
    pub const fn packed_size(self) -> usize {
        match self {
            UniformType::Float | UniformType::Int => 4,
            UniformType::Vec3 => 12,
            UniformType::Mat4 => 64,
            UniformType::Sampler => 0,
        }
    }

    fn default_value(self) -> UniformValue {
        match self {
            UniformType::Float => UniformValue::Float(0.0),
            UniformType::Int => UniformValue::Int(0),
            UniformType::Vec3 => UniformValue::Vec3(Vec3::ZERO),
            UniformType::Mat4 => UniformValue::Mat4(Mat4::ZERO),
            UniformType::Sampler => UniformValue::TextureUnit(0),
        }
    }
}

/// Where a reflected uniform lives on the GPU side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniformLocation {
    /// Inside the program's uniform block. `stride` is zero for scalars.
    Block { offset: u32, stride: u32 },
    /// A texture resource binding.
    Texture { group: u32, binding: u32 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct UniformDesc {
    pub ty: UniformType,
    /// Declared element count. One for scalars.
    pub array_len: u32,
    pub location: UniformLocation,
}

impl UniformDesc {
    pub fn is_array(&self) -> bool {
        self.array_len > 1
    }
}

/// Name -> description map for every active uniform of a program.
///
/// Backed by a `BTreeMap` so iteration order is deterministic.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UniformSchema {
    entries: BTreeMap<String, UniformDesc>,
    block_size: u32,
}

impl UniformSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an entry. Array names reported with a trailing `[0]` are
    /// recorded under their base name.
    pub fn insert(&mut self, name: &str, desc: UniformDesc) {
        let base = name.strip_suffix("[0]").unwrap_or(name);
        self.entries.insert(base.to_string(), desc);
    }

    pub fn set_block_size(&mut self, size: u32) {
        self.block_size = size;
    }

    /// Byte size of the uniform block, zero when the program has none.
    pub fn block_size(&self) -> u32 {
        self.block_size
    }

    pub fn get(&self, name: &str) -> Option<&UniformDesc> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &UniformDesc)> {
        self.entries.iter().map(|(name, desc)| (name.as_str(), desc))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A single typed uniform value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Int(i32),
    Vec3(Vec3),
    Mat4(Mat4),
    TextureUnit(u32),
}

impl UniformValue {
    pub fn ty(&self) -> UniformType {
        match self {
            UniformValue::Float(_) => UniformType::Float,
            UniformValue::Int(_) => UniformType::Int,
            UniformValue::Vec3(_) => UniformType::Vec3,
            UniformValue::Mat4(_) => UniformType::Mat4,
            UniformValue::TextureUnit(_) => UniformType::Sampler,
        }
    }

    fn write_to(&self, out: &mut [u8]) {
        match self {
            UniformValue::Float(v) => out[..4].copy_from_slice(bytemuck::bytes_of(v)),
            UniformValue::Int(v) => out[..4].copy_from_slice(bytemuck::bytes_of(v)),
            UniformValue::Vec3(v) => {
                out[..12].copy_from_slice(bytemuck::cast_slice(&v.to_array()))
            }
            UniformValue::Mat4(m) => {
                out[..64].copy_from_slice(bytemuck::cast_slice(&m.to_cols_array()))
            }
            UniformValue::TextureUnit(_) => {}
        }
    }
}

impl From<f32> for UniformValue {
    fn from(v: f32) -> Self {
        UniformValue::Float(v)
    }
}

impl From<i32> for UniformValue {
    fn from(v: i32) -> Self {
        UniformValue::Int(v)
    }
}

impl From<Vec3> for UniformValue {
    fn from(v: Vec3) -> Self {
        UniformValue::Vec3(v)
    }
}

impl From<Mat4> for UniformValue {
    fn from(v: Mat4) -> Self {
        UniformValue::Mat4(v)
    }
}

/// Stored shape of one uniform: exactly one value, or a fixed-length array.
#[derive(Debug, Clone, PartialEq)]
pub enum UniformSlot {
    Scalar(UniformValue),
    Array(Vec<UniformValue>),
}

impl UniformSlot {
    fn ty(&self) -> UniformType {
        match self {
            UniformSlot::Scalar(v) => v.ty(),
            UniformSlot::Array(values) => values[0].ty(),
        }
    }
}

/// Current values for every uniform declared by a schema.
///
/// Pure CPU state; a device reads it when a draw is issued.
#[derive(Clone, Default, PartialEq)]
pub struct UniformStore {
    slots: BTreeMap<String, UniformSlot>,
}

impl UniformStore {
    pub fn new(schema: &UniformSchema) -> Self {
        let slots = schema
            .iter()
            .map(|(name, desc)| {
                let value = desc.ty.default_value();
                let slot = if desc.is_array() {
                    UniformSlot::Array(vec![value; desc.array_len as usize])
                } else {
                    UniformSlot::Scalar(value)
                };
                (name.to_string(), slot)
            })
            .collect();
        Self { slots }
    }

    /// Replaces a scalar value.
    ///
    /// Unknown names and array entries are ignored. Panics if `value` does not
    /// have the declared type.
    pub fn set(&mut self, name: &str, value: impl Into<UniformValue>) {
        let value = value.into();
        let Some(slot) = self.slots.get_mut(name) else {
            return;
        };
        match slot {
            UniformSlot::Scalar(current) => {
                assert_eq!(
                    current.ty(),
                    value.ty(),
                    "uniform `{name}` is declared as {:?}",
                    current.ty()
                );
                *current = value;
            }
            UniformSlot::Array(_) => {
                log::trace!("uniform `{name}` is an array; whole-array set ignored");
            }
        }
    }

    /// Replaces element `index` of an array uniform.
    ///
    /// Unknown names are ignored. A scalar entry accepts index 0 only. Panics
    /// on a type mismatch or an index outside the declared length.
    pub fn set_indexed(&mut self, name: &str, index: usize, value: impl Into<UniformValue>) {
        let value = value.into();
        let Some(slot) = self.slots.get_mut(name) else {
            return;
        };
        let target = match slot {
            UniformSlot::Scalar(current) => {
                assert!(index == 0, "uniform `{name}` is scalar, index {index} is invalid");
                current
            }
            UniformSlot::Array(values) => {
                let len = values.len();
                assert!(
                    index < len,
                    "uniform `{name}` index {index} out of bounds (declared length {len})"
                );
                &mut values[index]
            }
        };
        assert_eq!(
            target.ty(),
            value.ty(),
            "uniform `{name}` is declared as {:?}",
            target.ty()
        );
        *target = value;
    }

    pub fn get(&self, name: &str) -> Option<&UniformValue> {
        match self.slots.get(name)? {
            UniformSlot::Scalar(v) => Some(v),
            UniformSlot::Array(_) => None,
        }
    }

    pub fn get_indexed(&self, name: &str, index: usize) -> Option<&UniformValue> {
        match self.slots.get(name)? {
            UniformSlot::Scalar(v) if index == 0 => Some(v),
            UniformSlot::Scalar(_) => None,
            UniformSlot::Array(values) => values.get(index),
        }
    }

    pub fn slot(&self, name: &str) -> Option<&UniformSlot> {
        self.slots.get(name)
    }

    /// Texture unit held by a sampler entry (element `index` for arrays).
    pub fn texture_unit(&self, name: &str, index: usize) -> Option<u32> {
        match self.get_indexed(name, index)? {
            UniformValue::TextureUnit(unit) => Some(*unit),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Packs every block-resident value into `out` at its reflected offset.
    ///
    /// `out` must be at least `schema.block_size()` bytes. Entries missing from
    /// either side are skipped.
    pub fn write_block(&self, schema: &UniformSchema, out: &mut [u8]) {
        for (name, desc) in schema.iter() {
            let UniformLocation::Block { offset, stride } = desc.location else {
                continue;
            };
            let Some(slot) = self.slots.get(name) else {
                continue;
            };
            if slot.ty() != desc.ty {
                log::warn!("uniform `{name}` type drifted from schema; skipped");
                continue;
            }
            let size = desc.ty.packed_size();
            let values: &[UniformValue] = match slot {
                UniformSlot::Scalar(v) => std::slice::from_ref(v),
                UniformSlot::Array(values) => values,
            };
            for (i, value) in values.iter().enumerate() {
                let start = offset as usize + i * stride as usize;
                let Some(dst) = out.get_mut(start..start + size) else {
                    log::warn!("uniform `{name}`[{i}] lies outside the block; skipped");
                    break;
                };
                value.write_to(dst);
            }
        }
    }
}

impl fmt::Debug for UniformStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.slots.iter()).finish()
    }
}
