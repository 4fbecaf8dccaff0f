//! SRT packet buffers
//!
//! An [`SrtPacket`] owns one transport datagram's worth of TS bytes. The
//! publish path copies each packet once per subscriber, so `copy()` must be a
//! reference-count bump rather than an allocation. Writes go through `wrap`,
//! which reuses the existing backing allocation whenever the packet still
//! holds the only handle to it.

use bytes::{Bytes, BytesMut};

/// A sized byte buffer with refcount-shared copies.
///
/// The payload lives in exactly one of two places: a writable `BytesMut`
/// while the packet is being filled, or a frozen `Bytes` once it has been
/// copied or adopted from a foreign message. `data()` always reads from
/// whichever side currently holds it.
#[derive(Debug, Default)]
pub struct SrtPacket {
    /// Writable backing, drained into `shared` the first time the packet
    /// is copied. Retains its allocation as spare capacity for `wrap`.
    unique: BytesMut,
    /// Refcount-shared backing once frozen or adopted.
    shared: Option<Bytes>,
    /// Logical payload size; the backing buffer may be larger.
    actual_size: usize,
}

impl SrtPacket {
    /// An empty packet with no backing buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepare a writable payload region of `size` bytes.
    ///
    /// The existing backing allocation is reused when it is large enough and
    /// this packet holds the only handle to it; otherwise a fresh buffer is
    /// allocated. Returns the region for the transport reader to fill.
    pub fn wrap(&mut self, size: usize) -> &mut [u8] {
        if self.unique.capacity() < size {
            // Reclaim the frozen buffer when no copy still references it.
            self.unique = match self.shared.take().map(Bytes::try_into_mut) {
                Some(Ok(reclaimed)) if reclaimed.capacity() >= size => reclaimed,
                _ => BytesMut::with_capacity(size),
            };
        }
        self.shared = None;
        self.unique.resize(size, 0);
        self.actual_size = size;
        &mut self.unique[..size]
    }

    /// `wrap(data.len())` followed by a copy of `data` into the region.
    pub fn wrap_slice(&mut self, data: &[u8]) -> &mut [u8] {
        let region = self.wrap(data.len());
        region.copy_from_slice(data);
        region
    }

    /// Adopt a foreign message's payload without copying.
    ///
    /// The handle is shared by refcount; the packet's logical size becomes
    /// the payload length. Any previous writable backing is kept as spare
    /// capacity for a later `wrap`.
    pub fn wrap_shared(&mut self, payload: Bytes) {
        self.actual_size = payload.len();
        self.unique.clear();
        self.shared = Some(payload);
    }

    /// An independent packet sharing this packet's bytes by refcount. O(1).
    pub fn copy(&mut self) -> SrtPacket {
        let shared = match &self.shared {
            Some(bytes) => bytes.clone(),
            None => {
                let frozen = self.unique.split().freeze();
                self.shared = Some(frozen.clone());
                frozen
            }
        };
        SrtPacket {
            unique: BytesMut::new(),
            shared: Some(shared),
            actual_size: self.actual_size,
        }
    }

    /// The logical payload.
    pub fn data(&self) -> &[u8] {
        match &self.shared {
            Some(bytes) => &bytes[..self.actual_size],
            None => &self.unique[..self.actual_size],
        }
    }

    /// Logical payload size in bytes.
    pub fn size(&self) -> usize {
        self.actual_size
    }

    /// True when the packet holds no payload.
    pub fn is_empty(&self) -> bool {
        self.actual_size == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_and_read_back() {
        let mut packet = SrtPacket::new();
        let region = packet.wrap(4);
        region.copy_from_slice(&[1, 2, 3, 4]);
        assert_eq!(packet.size(), 4);
        assert_eq!(packet.data(), &[1, 2, 3, 4]);
    }

    #[test]
    fn wrap_reuses_capacity_when_shrinking() {
        let mut packet = SrtPacket::new();
        packet.wrap(1316);
        let ptr = packet.data().as_ptr();
        packet.wrap(188);
        assert_eq!(packet.data().as_ptr(), ptr);
        assert_eq!(packet.size(), 188);
    }

    #[test]
    fn copy_survives_original_rewrap() {
        let mut packet = SrtPacket::new();
        packet.wrap_slice(b"hello srt");
        let copy = packet.copy();

        // Overwriting the original must not disturb the copy.
        packet.wrap_slice(b"other bytes!");
        assert_eq!(copy.data(), b"hello srt");
        assert_eq!(packet.data(), b"other bytes!");
    }

    #[test]
    fn copy_survives_original_drop() {
        let copy = {
            let mut packet = SrtPacket::new();
            packet.wrap_slice(&[0x47, 0x00, 0x11]);
            packet.copy()
        };
        assert_eq!(copy.data(), &[0x47, 0x00, 0x11]);
    }

    #[test]
    fn copies_share_backing_bytes() {
        let mut packet = SrtPacket::new();
        packet.wrap_slice(b"shared payload");
        let a = packet.copy();
        let b = packet.copy();
        assert_eq!(a.data().as_ptr(), b.data().as_ptr());
    }

    #[test]
    fn wrap_shared_adopts_without_copy() {
        let payload = Bytes::from_static(b"foreign message");
        let mut packet = SrtPacket::new();
        packet.wrap_shared(payload.clone());
        assert_eq!(packet.size(), payload.len());
        assert_eq!(packet.data().as_ptr(), payload.as_ptr());
    }

    #[test]
    fn wrap_after_copy_allocates_fresh_backing() {
        let mut packet = SrtPacket::new();
        packet.wrap_slice(b"first");
        let copy = packet.copy();

        // The copy still references the old buffer, so wrap must not
        // scribble over it.
        let region = packet.wrap(5);
        region.copy_from_slice(b"again");
        assert_eq!(copy.data(), b"first");
        assert_eq!(packet.data(), b"again");
    }

    #[test]
    fn wrap_reclaims_backing_after_copies_drop() {
        let mut packet = SrtPacket::new();
        packet.wrap(2048);
        let copy = packet.copy();
        let shared_ptr = copy.data().as_ptr();
        drop(copy);

        // Last handle back in this packet: wrap may reclaim the allocation.
        let region = packet.wrap(1024);
        assert_eq!(region.as_ptr(), shared_ptr);
    }

    #[test]
    fn empty_packet() {
        let packet = SrtPacket::new();
        assert!(packet.is_empty());
        assert_eq!(packet.size(), 0);
        assert_eq!(packet.data(), &[] as &[u8]);
    }
}
