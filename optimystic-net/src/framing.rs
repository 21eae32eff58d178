//! Length-prefixed JSON framing. A frame is a big-endian `u32` byte length followed
//! by that many bytes of UTF-8 JSON.

use std::io::{Read, Write};

use optimystic_base::{err, kind_err, Error, ErrorKind, Result};
use serde::{de::DeserializeOwned, Serialize};

const MAX_FRAME_LEN: u32 = 64 * 1024 * 1024;

pub fn write_frame<W: Write, T: Serialize>(writer: &mut W, value: &T) -> Result<()> {
    let body = serde_json::to_vec(value).map_err(Error::new)?;
    if body.len() as u64 > MAX_FRAME_LEN as u64 {
        return Err(err("message exceeds max frame length"));
    }
    writer.write_all(&(body.len() as u32).to_be_bytes()).map_err(Error::new)?;
    writer.write_all(&body).map_err(Error::new)?;
    Ok(())
}

pub fn read_frame<R: Read, T: DeserializeOwned>(reader: &mut R) -> Result<T> {
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf).map_err(Error::new)?;
    let len = u32::from_be_bytes(len_buf);
    if len > MAX_FRAME_LEN {
        return Err(kind_err(ErrorKind::Other, "frame length exceeds maximum"));
    }
    let mut body = vec![0u8; len as usize];
    reader.read_exact(&mut body).map_err(Error::new)?;
    serde_json::from_slice(&body).map_err(Error::new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct Ping(u32);

    #[test]
    fn round_trips_a_frame() {
        let mut buf = Vec::new();
        write_frame(&mut buf, &Ping(42)).unwrap();
        let mut cursor = std::io::Cursor::new(buf);
        let out: Ping = read_frame(&mut cursor).unwrap();
        assert_eq!(out, Ping(42));
    }

    #[test]
    fn rejects_an_oversized_declared_length() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&(MAX_FRAME_LEN + 1).to_be_bytes());
        let mut cursor = std::io::Cursor::new(buf);
        let result: Result<Ping> = read_frame(&mut cursor);
        assert!(result.is_err());
    }
}
