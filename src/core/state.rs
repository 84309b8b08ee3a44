// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 itsakeyfut
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Save state stream
//!
//! A [`StateWrapper`] is either reading or writing a byte buffer made of
//! sections. Each section is a little-endian `u32` length followed by a
//! bincode-encoded value, so a component that does not understand a section
//! can still skip over it.
//!
//! # Example
//!
//! ```
//! use psrx_texcache::core::state::StateWrapper;
//!
//! let mut sw = StateWrapper::writer();
//! sw.write_section(&(1u32, vec![1u16, 2, 3])).unwrap();
//! sw.write_section(&"trailer").unwrap();
//!
//! let mut sw = StateWrapper::reader(sw.into_data());
//! sw.skip_section().unwrap();
//! let trailer: String = sw.read_section().unwrap();
//! assert_eq!(trailer, "trailer");
//! assert!(sw.is_at_end());
//! ```

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::core::error::{Result, TextureCacheError};

const LENGTH_PREFIX_SIZE: usize = std::mem::size_of::<u32>();

/// Direction of a state stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateMode {
    Read,
    Write,
}

/// Sectioned save state reader/writer
#[derive(Debug)]
pub struct StateWrapper {
    data: Vec<u8>,
    position: usize,
    mode: StateMode,
}

impl StateWrapper {
    /// Create an empty stream for writing
    pub fn writer() -> Self {
        Self {
            data: Vec::new(),
            position: 0,
            mode: StateMode::Write,
        }
    }

    /// Create a stream reading `data` from the start
    pub fn reader(data: Vec<u8>) -> Self {
        Self {
            data,
            position: 0,
            mode: StateMode::Read,
        }
    }

    #[inline]
    pub fn mode(&self) -> StateMode {
        self.mode
    }

    #[inline]
    pub fn is_reading(&self) -> bool {
        self.mode == StateMode::Read
    }

    #[inline]
    pub fn is_writing(&self) -> bool {
        self.mode == StateMode::Write
    }

    /// Whether every section has been consumed
    pub fn is_at_end(&self) -> bool {
        self.position >= self.data.len()
    }

    /// Take the written (or remaining unread) bytes
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Append one section
    pub fn write_section<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        debug_assert!(self.is_writing(), "writing to a state reader");

        let bytes = bincode::serde::encode_to_vec(value, bincode::config::standard())
            .map_err(|e| TextureCacheError::StateSerialization(e.to_string()))?;
        let length = u32::try_from(bytes.len()).map_err(|_| {
            TextureCacheError::StateSerialization(format!(
                "section of {} bytes is too large",
                bytes.len()
            ))
        })?;

        self.data.extend_from_slice(&length.to_le_bytes());
        self.data.extend_from_slice(&bytes);
        self.position = self.data.len();
        Ok(())
    }

    /// Decode the next section
    pub fn read_section<T: DeserializeOwned>(&mut self) -> Result<T> {
        let bytes = self.next_section()?;
        let (value, used) =
            bincode::serde::decode_from_slice::<T, _>(bytes, bincode::config::standard())
                .map_err(|e| TextureCacheError::StateSerialization(e.to_string()))?;
        if used != bytes.len() {
            return Err(TextureCacheError::StateSerialization(format!(
                "section has {} trailing bytes",
                bytes.len() - used
            )));
        }
        Ok(value)
    }

    /// Consume the next section without decoding it
    pub fn skip_section(&mut self) -> Result<()> {
        self.next_section().map(|_| ())
    }

    fn next_section(&mut self) -> Result<&[u8]> {
        debug_assert!(self.is_reading(), "reading from a state writer");

        let start = self.position;
        let header = self
            .data
            .get(start..start + LENGTH_PREFIX_SIZE)
            .ok_or_else(|| {
                TextureCacheError::StateSerialization("truncated section header".to_string())
            })?;
        let mut length = [0u8; LENGTH_PREFIX_SIZE];
        length.copy_from_slice(header);
        let length = u32::from_le_bytes(length) as usize;

        let body_start = start + LENGTH_PREFIX_SIZE;
        let body_end = body_start + length;
        if body_end > self.data.len() {
            return Err(TextureCacheError::StateSerialization(format!(
                "section of {} bytes exceeds remaining {} bytes",
                length,
                self.data.len() - body_start
            )));
        }

        self.position = body_end;
        Ok(&self.data[body_start..body_end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sections_round_trip_in_order() {
        let mut sw = StateWrapper::writer();
        sw.write_section(&42u32).unwrap();
        sw.write_section(&vec![(1i32, 2i32), (3, 4)]).unwrap();

        let mut sw = StateWrapper::reader(sw.into_data());
        assert!(sw.is_reading());
        assert_eq!(sw.read_section::<u32>().unwrap(), 42);
        assert_eq!(
            sw.read_section::<Vec<(i32, i32)>>().unwrap(),
            vec![(1, 2), (3, 4)]
        );
        assert!(sw.is_at_end());
    }

    #[test]
    fn test_truncated_header() {
        let mut sw = StateWrapper::reader(vec![1, 0]);
        assert!(matches!(
            sw.read_section::<u32>(),
            Err(TextureCacheError::StateSerialization(_))
        ));
    }

    #[test]
    fn test_truncated_body() {
        let mut sw = StateWrapper::reader(vec![8, 0, 0, 0, 1, 2]);
        assert!(sw.skip_section().is_err());
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let mut sw = StateWrapper::writer();
        sw.write_section(&(7u8, 9u8)).unwrap();
        let mut sw = StateWrapper::reader(sw.into_data());
        assert!(sw.read_section::<u8>().is_err());
    }
}
