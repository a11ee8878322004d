// Copyright 2024 shardq Authors
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
//
// Site RPC wire format: no gRPC/protobuf (§4.7/§6). Every scalar is
// written little-endian; strings and vectors are a `u32` length prefix
// followed by their elements, mirroring the raw-pointer writes in
// `serializer.hpp` one field at a time rather than framing a whole
// message with a schema.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use shardq_common::{Result, ShardqError};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

pub async fn write_u32<W: AsyncWriteExt + Unpin>(out: &mut W, v: u32) -> Result<()> {
    out.write_u32_le(v).await.map_err(ShardqError::from)
}

pub async fn read_u32<R: AsyncReadExt + Unpin>(input: &mut R) -> Result<u32> {
    input.read_u32_le().await.map_err(ShardqError::from)
}

pub async fn write_i64<W: AsyncWriteExt + Unpin>(out: &mut W, v: i64) -> Result<()> {
    out.write_i64_le(v).await.map_err(ShardqError::from)
}

pub async fn read_i64<R: AsyncReadExt + Unpin>(input: &mut R) -> Result<i64> {
    input.read_i64_le().await.map_err(ShardqError::from)
}

pub async fn write_string<W: AsyncWriteExt + Unpin>(out: &mut W, s: &str) -> Result<()> {
    write_u32(out, s.len() as u32).await?;
    out.write_all(s.as_bytes()).await.map_err(ShardqError::from)
}

pub async fn read_string<R: AsyncReadExt + Unpin>(input: &mut R) -> Result<String> {
    let len = read_u32(input).await? as usize;
    let mut buf = vec![0u8; len];
    input.read_exact(&mut buf).await.map_err(ShardqError::from)?;
    String::from_utf8(buf).map_err(|e| ShardqError::internal(format!("invalid utf8 on wire: {e}")))
}

pub async fn write_string_vec<W: AsyncWriteExt + Unpin>(out: &mut W, items: &[String]) -> Result<()> {
    write_u32(out, items.len() as u32).await?;
    for item in items {
        write_string(out, item).await?;
    }
    Ok(())
}

pub async fn read_string_vec<R: AsyncReadExt + Unpin>(input: &mut R) -> Result<Vec<String>> {
    let len = read_u32(input).await? as usize;
    let mut out = Vec::with_capacity(len);
    for _ in 0..len {
        out.push(read_string(input).await?);
    }
    Ok(out)
}

pub async fn write_row_vec<W: AsyncWriteExt + Unpin>(out: &mut W, rows: &[Vec<String>]) -> Result<()> {
    write_u32(out, rows.len() as u32).await?;
    for row in rows {
        write_string_vec(out, row).await?;
    }
    Ok(())
}

pub async fn read_row_vec<R: AsyncReadExt + Unpin>(input: &mut R) -> Result<Vec<Vec<String>>> {
    let len = read_u32(input).await? as usize;
    let mut out = Vec::with_capacity(len);
    for _ in 0..len {
        out.push(read_string_vec(input).await?);
    }
    Ok(out)
}

pub fn sync_read_u32(buf: &[u8]) -> Result<u32> {
    let mut cur = std::io::Cursor::new(buf);
    cur.read_u32::<LittleEndian>().map_err(ShardqError::from)
}

pub fn sync_write_u32(v: u32) -> [u8; 4] {
    let mut buf = [0u8; 4];
    (&mut buf[..])
        .write_u32::<LittleEndian>(v)
        .expect("writing to a fixed 4-byte buffer cannot fail");
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn string_and_row_vec_round_trip() {
        let mut buf: Vec<u8> = Vec::new();
        write_string(&mut buf, "hello").await.unwrap();
        write_row_vec(&mut buf, &[vec!["a".into(), "b".into()], vec!["c".into()]])
            .await
            .unwrap();

        let mut cur = std::io::Cursor::new(buf);
        assert_eq!(read_string(&mut cur).await.unwrap(), "hello");
        let rows = read_row_vec(&mut cur).await.unwrap();
        assert_eq!(rows, vec![vec!["a".to_string(), "b".to_string()], vec!["c".to_string()]]);
    }

    #[test]
    fn fixed_u32_round_trips() {
        let buf = sync_write_u32(42);
        assert_eq!(sync_read_u32(&buf).unwrap(), 42);
    }
}
