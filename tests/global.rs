//! Use the allocator as the global allocator of a whole test binary.
#![cfg(unix)]

use listalloc::{Allocator, SystemRegion};
use std::collections::BTreeMap;
use std::panic;

const HEAP_SIZE: usize = 64 * 1024 * 1024;

#[global_allocator]
static ALLOCATOR: Allocator<HEAP_SIZE, SystemRegion> = Allocator::new();

#[test]
fn vec() {
    let mut v = vec![1, 2, 3];
    v.push(4);

    assert_eq!((1..=4).collect::<Vec<_>>(), v);
}

#[test]
fn map_and_formatting() {
    let mut map = BTreeMap::new();
    map.insert(10, "Hello");
    map.insert(11, "world");
    map.insert(-1, "english");

    let english = format!("[{}]: {}, {}!", map[&-1], map[&10], map[&11]);
    assert_eq!(english, "[english]: Hello, world!");
}

#[test]
fn over_aligned_values() {
    #[repr(align(64))]
    struct CacheLine([u8; 64]);

    let lines: Vec<_> = (0..16u8).map(|n| Box::new(CacheLine([n; 64]))).collect();
    for (n, line) in lines.iter().enumerate() {
        assert_eq!(&**line as *const CacheLine as usize % 64, 0);
        assert!(line.0.iter().all(|&byte| byte == n as u8));
    }

    let mut page = Vec::<u8>::with_capacity(4096);
    page.resize(4096, 0xaa);
    assert!(page.iter().all(|&byte| byte == 0xaa));
}

#[test]
fn zero_sized_request_panics_without_deadlock() {
    assert!(panic::catch_unwind(|| ALLOCATOR.allocate(0)).is_err());

    // the lock is free again: the panic machinery and this vector allocate
    let v = vec![0u64; 32];
    assert_eq!(v.len(), 32);
}
