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
// Every RPC call is a single request frame followed by a single response
// frame over one TCP stream: a `u32` byte length, then the encoded
// `RpcRequest`/`RpcResponse` body. One frame per call keeps the codec
// symmetric with the CLI's own length-prefixed replies (§6).

use shardq_common::{Result, ShardqError};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::message::{RpcRequest, RpcResponse};
use crate::wire::{read_u32, write_u32};

async fn write_frame<W: AsyncWriteExt + Unpin>(out: &mut W, body: &[u8]) -> Result<()> {
    write_u32(out, body.len() as u32).await?;
    out.write_all(body).await.map_err(ShardqError::from)?;
    out.flush().await.map_err(ShardqError::from)
}

async fn read_frame<R: AsyncReadExt + Unpin>(input: &mut R) -> Result<Vec<u8>> {
    let len = read_u32(input).await? as usize;
    let mut buf = vec![0u8; len];
    input.read_exact(&mut buf).await.map_err(ShardqError::from)?;
    Ok(buf)
}

pub async fn send_request(stream: &mut TcpStream, req: &RpcRequest) -> Result<RpcResponse> {
    let mut body = Vec::new();
    req.write(&mut body).await?;
    write_frame(stream, &body).await?;

    let resp_body = read_frame(stream).await?;
    let mut cur = std::io::Cursor::new(resp_body);
    RpcResponse::read(&mut cur).await
}

pub async fn recv_request(stream: &mut TcpStream) -> Result<Option<RpcRequest>> {
    let len = match read_u32(stream).await {
        Ok(len) => len,
        Err(ShardqError::Connection { .. }) => return Ok(None),
        Err(e) => return Err(e),
    };
    let mut buf = vec![0u8; len as usize];
    stream.read_exact(&mut buf).await.map_err(ShardqError::from)?;
    let mut cur = std::io::Cursor::new(buf);
    Ok(Some(RpcRequest::read(&mut cur).await?))
}

pub async fn send_response(stream: &mut TcpStream, resp: &RpcResponse) -> Result<()> {
    let mut body = Vec::new();
    resp.write(&mut body).await?;
    write_frame(stream, &body).await
}
