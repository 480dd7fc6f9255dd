// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::io;

use symphonia::core::errors::Error as SymphoniaError;

/// Errors from decoding and converting pad samples: why a file couldn't become a playable buffer.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("unable to open: {0}")]
    Io(#[from] io::Error),

    #[error("codec error: {0}")]
    Codec(#[from] SymphoniaError),

    #[error("unplayable file {0}")]
    Unplayable(String),

    #[error("no audio in {0}")]
    Empty(String),

    #[error("unable to resample from {from}Hz to {to}Hz")]
    Resample { from: u32, to: u32 },
}
