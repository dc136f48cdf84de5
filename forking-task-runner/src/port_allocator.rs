use std::collections::HashSet;
use std::sync::Mutex;

use anyhow::{bail, Result};

/// An in-memory pool of TCP ports starting at a configured low-water mark. This does not probe
/// the operating system; it is the sole arbiter of "free" within the process that owns it.
pub struct PortAllocator {
    start_port: u16,
    used: Mutex<HashSet<u16>>,
}

impl PortAllocator {
    pub fn new(start_port: u16) -> Self {
        Self {
            start_port,
            used: Mutex::new(HashSet::new()),
        }
    }

    /// Returns a port `>= start_port` not currently held, and marks it used.
    pub fn find_unused_port(&self) -> Result<u16> {
        let mut used = self.used.lock().unwrap();
        let port = Self::scan(&used, self.start_port, 1)
            .ok_or_else(|| anyhow::anyhow!("port pool exhausted scanning from {}", self.start_port))?;
        used.insert(port);
        Ok(port)
    }

    /// Returns `(p, p+1)`, both free, and marks both used as a single reservation.
    pub fn find_two_consecutive_unused_ports(&self) -> Result<(u16, u16)> {
        let mut used = self.used.lock().unwrap();
        let port = Self::scan(&used, self.start_port, 2)
            .ok_or_else(|| anyhow::anyhow!("port pool exhausted scanning from {}", self.start_port))?;
        let (p, q) = (port, port + 1);
        used.insert(p);
        used.insert(q);
        Ok((p, q))
    }

    /// Returns a port to the pool.
    pub fn mark_port_unused(&self, port: u16) {
        self.used.lock().unwrap().remove(&port);
    }

    /// Finds the lowest `p >= from` such that `p, p+1, .., p+width-1` are all free, without
    /// mutating `used`.
    fn scan(used: &HashSet<u16>, from: u16, width: u16) -> Option<u16> {
        let mut candidate = from;
        loop {
            let end = candidate.checked_add(width - 1)?;
            if (candidate..=end).all(|p| !used.contains(&p)) {
                return Some(candidate);
            }
            candidate = candidate.checked_add(1)?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hands_out_increasing_ports_from_start() {
        let allocator = PortAllocator::new(8100);
        assert_eq!(allocator.find_unused_port().unwrap(), 8100);
        assert_eq!(allocator.find_unused_port().unwrap(), 8101);
    }

    #[test]
    fn returned_port_is_reusable() {
        let allocator = PortAllocator::new(8100);
        let p = allocator.find_unused_port().unwrap();
        allocator.mark_port_unused(p);
        assert_eq!(allocator.find_unused_port().unwrap(), p);
    }

    #[test]
    fn consecutive_pair_after_fragmenting_pool() {
        // Scenario 6: startPort=8100, reserve 8101 individually, then ask for a pair.
        let allocator = PortAllocator::new(8100);
        let reserved = allocator.find_unused_port().unwrap(); // 8100
        assert_eq!(reserved, 8100);
        let p2 = allocator.find_unused_port().unwrap(); // 8101, fragmenting the pool
        assert_eq!(p2, 8101);
        allocator.mark_port_unused(reserved); // free 8100 again, leaving a hole at 8100
        let (a, b) = allocator.find_two_consecutive_unused_ports().unwrap();
        // 8100 is free but 8101 (its pair) is not; the next adjacent free pair is (8102, 8103).
        assert_eq!((a, b), (8102, 8103));
    }

    #[test]
    fn exhaustion_is_reported_as_an_error() {
        let allocator = PortAllocator::new(u16::MAX - 1);
        allocator.find_unused_port().unwrap(); // u16::MAX - 1
        allocator.find_unused_port().unwrap(); // u16::MAX
        assert!(allocator.find_unused_port().is_err());
    }
}
