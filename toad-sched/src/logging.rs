use core::fmt::Write;

use tinyvec::ArrayVec;
use toad_writable::Writable;

/// Number of leading bytes rendered by [`dgram_summary`]
const PEEK: usize = 8;

/// `"<len> byte dgram [<first 8 bytes in hex>..]"`, formatted without allocating
pub(crate) fn dgram_summary(bytes: &[u8]) -> Writable<ArrayVec<[u8; 64]>> {
  let mut buf: Writable<ArrayVec<[u8; 64]>> = Default::default();
  write!(buf, "{} byte dgram [", bytes.len()).ok();

  bytes.iter().take(PEEK).enumerate().for_each(|(ix, b)| {
                                       let sep = if ix == 0 { "" } else { " " };
                                       write!(buf, "{}{:02x}", sep, b).ok();
                                     });

  let ellipsis = if bytes.len() > PEEK { "..]" } else { "]" };
  buf.write_str(ellipsis).ok();
  buf
}
