//! The Server-Key Store: a refcounted cache of remote device keys, shared between
//! the synchronous request pipeline (acquire/release around a Pending Request) and
//! the ingress path (`read_device_key`, consulted by the crypto layer when
//! decrypting remote-device-key traffic). Protected by `critical_section` rather
//! than `embassy-sync`'s executor-coupled primitives, since this subsystem has no
//! async executor to couple to (see `crate::traits`).

use btmesh_common::address::UnicastAddress;
use core::cell::RefCell;
use critical_section::Mutex;
use heapless::Vec;

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum AcquireResult {
    Stored,
    AlreadyPresent,
    Full,
}

struct Entry {
    server_addr: UnicastAddress,
    device_key: [u8; 16],
    refcount: u8,
}

struct Inner<const N: usize> {
    entries: Vec<Option<Entry>, N>,
}

impl<const N: usize> Default for Inner<N> {
    fn default() -> Self {
        let mut entries = Vec::new();
        entries.resize_with(N, || None).ok();
        Self { entries }
    }
}

/// `N` bounds the number of distinct remote servers tracked concurrently
/// (the `MAX_SERVERS` configuration parameter).
pub struct ServerKeyStore<const N: usize = 8> {
    inner: Mutex<RefCell<Inner<N>>>,
}

impl<const N: usize> Default for ServerKeyStore<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> ServerKeyStore<N> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(RefCell::new(Inner::default())),
        }
    }

    /// Stores `device_key` for `server_addr` with refcount 1 on first acquisition,
    /// or increments the refcount on a repeat acquisition. A mismatched device key
    /// on a repeat acquisition is a caller contract violation.
    pub fn acquire(&self, server_addr: UnicastAddress, device_key: [u8; 16]) -> AcquireResult {
        critical_section::with(|cs| {
            let mut inner = self.inner.borrow(cs).borrow_mut();
            if let Some(entry) = inner
                .entries
                .iter_mut()
                .flatten()
                .find(|e| e.server_addr == server_addr)
            {
                debug_assert_eq!(
                    entry.device_key, device_key,
                    "device key changed for a server already tracked by the key store"
                );
                entry.refcount += 1;
                return AcquireResult::AlreadyPresent;
            }

            if let Some(slot) = inner.entries.iter_mut().find(|e| e.is_none()) {
                slot.replace(Entry {
                    server_addr,
                    device_key,
                    refcount: 1,
                });
                AcquireResult::Stored
            } else {
                AcquireResult::Full
            }
        })
    }

    /// Decrements the refcount for `server_addr`, clearing the slot when it reaches
    /// zero. A release with no matching entry is a no-op.
    pub fn release(&self, server_addr: UnicastAddress) {
        critical_section::with(|cs| {
            let mut inner = self.inner.borrow(cs).borrow_mut();
            if let Some(slot) = inner
                .entries
                .iter_mut()
                .find(|e| matches!(e, Some(entry) if entry.server_addr == server_addr))
            {
                let done = {
                    let entry = slot.as_mut().unwrap();
                    debug_assert!(entry.refcount > 0, "server-key refcount underflow");
                    entry.refcount = entry.refcount.saturating_sub(1);
                    entry.refcount == 0
                };
                if done {
                    slot.take();
                }
            }
        });
    }

    pub fn read_device_key(&self, server_addr: UnicastAddress) -> Option<[u8; 16]> {
        critical_section::with(|cs| {
            self.inner
                .borrow(cs)
                .borrow()
                .entries
                .iter()
                .flatten()
                .find(|e| e.server_addr == server_addr)
                .map(|e| e.device_key)
        })
    }

    #[cfg(test)]
    fn refcount(&self, server_addr: UnicastAddress) -> u8 {
        critical_section::with(|cs| {
            self.inner
                .borrow(cs)
                .borrow()
                .entries
                .iter()
                .flatten()
                .find(|e| e.server_addr == server_addr)
                .map(|e| e.refcount)
                .unwrap_or(0)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(v: u16) -> UnicastAddress {
        UnicastAddress::new(v).unwrap()
    }

    #[test]
    fn acquire_then_release_frees_the_slot() {
        let store: ServerKeyStore<4> = ServerKeyStore::new();
        let a = addr(0x0100);
        assert_eq!(store.acquire(a, [0u8; 16]), AcquireResult::Stored);
        assert_eq!(store.acquire(a, [0u8; 16]), AcquireResult::AlreadyPresent);
        assert_eq!(store.refcount(a), 2);

        store.release(a);
        assert_eq!(store.refcount(a), 1);
        assert!(store.read_device_key(a).is_some());

        store.release(a);
        assert_eq!(store.refcount(a), 0);
        assert!(store.read_device_key(a).is_none());
    }

    #[test]
    fn full_store_refuses_new_servers() {
        let store: ServerKeyStore<1> = ServerKeyStore::new();
        assert_eq!(store.acquire(addr(1), [0u8; 16]), AcquireResult::Stored);
        assert_eq!(store.acquire(addr(2), [0u8; 16]), AcquireResult::Full);
    }
}
