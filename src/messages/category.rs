//! Category name messages
//!
//! Categories let viewers toggle groups of shapes. Body layout:
//! `[CATEGORY(2)] [PARENT(2)] [ACTIVE(1)] [NAME_LEN(2)] [UTF-8 NAME]`.

use super::{write_u16, WireReader};
use crate::error::{Error, Result};
use crate::protocol::narrow_u16;

/// The only category message id
pub const CATEGORY_NAME: u16 = 0;

/// Names a category and places it in the category tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryNameMessage {
    /// Category being named; 0 is the root
    pub category_id: u16,
    /// Parent category; 0 for top-level
    pub parent_id: u16,
    /// Whether viewers show this category by default
    pub default_active: bool,
    /// Display name
    pub name: String,
}

impl CategoryNameMessage {
    /// Append the body
    pub fn write(&self, out: &mut Vec<u8>) -> Result<()> {
        write_u16(out, self.category_id);
        write_u16(out, self.parent_id);
        out.push(self.default_active as u8);
        write_u16(out, narrow_u16(self.name.len())?);
        out.extend_from_slice(self.name.as_bytes());
        Ok(())
    }

    /// Decode a body
    pub fn read(body: &[u8]) -> Result<Self> {
        let mut reader = WireReader::new(body);
        let category_id = reader.read_u16()?;
        let parent_id = reader.read_u16()?;
        let default_active = reader.read_u8()? != 0;
        let name_len = reader.read_u16()? as usize;
        let name = std::str::from_utf8(reader.read_bytes(name_len)?)
            .map_err(|e| Error::InvalidMessage(format!("category name: {}", e)))?
            .to_string();
        Ok(Self {
            category_id,
            parent_id,
            default_active,
            name,
        })
    }
}
