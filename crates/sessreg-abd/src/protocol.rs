//! ABD message shapes.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ReadRequest {}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReadReply {
    pub version: u64,
    pub value: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct WriteRequest {
    pub version: u64,
    pub value: u64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WriteReply {}
