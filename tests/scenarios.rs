mod common;

use common::{check, layout, region};
use listalloc::{AllocError, Allocator, SliceRegion, HEADER_SIZE};
use test_log::test;

type Heap440 = Allocator<440, SliceRegion>;

fn heap440() -> Heap440 {
    Allocator::with_source(region(440))
}

#[test]
fn first_fit_reuses_released_block() {
    let heap = heap440();

    let first = heap.allocate(16).unwrap();
    let second = heap.allocate(16).unwrap();
    assert_eq!(
        second.as_ptr() as usize - first.as_ptr() as usize,
        HEADER_SIZE + 16
    );
    heap.release(first.as_ptr());

    let third = heap.allocate(16).unwrap();
    assert_eq!(third, first);
    assert_eq!(
        layout(&heap),
        [
            (16, false),
            (16, false),
            (440 - 3 * HEADER_SIZE - 32, true)
        ]
    );
    check(&heap);
}

#[test]
fn single_allocation_leaves_two_blocks() {
    let heap = heap440();

    let first = heap.allocate(16).unwrap();
    heap.release(first.as_ptr());
    assert_eq!(layout(&heap), [(440 - HEADER_SIZE, true)]);

    assert_eq!(heap.allocate(16), Some(first));
    assert_eq!(
        layout(&heap),
        [(16, false), (440 - 2 * HEADER_SIZE - 16, true)]
    );
    heap.dump();
}

#[test]
fn releasing_null_changes_nothing() {
    let heap = heap440();
    heap.allocate(24).unwrap();
    heap.allocate(40).unwrap();

    let before: Vec<_> = heap.blocks().collect();
    heap.release(std::ptr::null_mut());
    let after: Vec<_> = heap.blocks().collect();
    assert_eq!(before, after);
}

#[test]
fn unmatched_releases_change_nothing() {
    let heap = heap440();
    let a = heap.allocate(24).unwrap();
    let b = heap.allocate(40).unwrap();
    heap.release(a.as_ptr());

    let before: Vec<_> = heap.blocks().collect();
    heap.release(a.as_ptr());
    heap.release(unsafe { b.as_ptr().add(8) });
    let mut foreign = [0u64; 4];
    heap.release(foreign.as_mut_ptr().cast());
    let after: Vec<_> = heap.blocks().collect();
    assert_eq!(before, after);
}

#[test]
fn round_trip() {
    let heap = heap440();
    let _keep = heap.allocate(8).unwrap();

    for n in [1, 7, 8, 9, 100, 200] {
        let before = layout(&heap);
        let ptr = heap.allocate(n).unwrap();
        heap.release(ptr.as_ptr());
        assert_eq!(layout(&heap), before);
        assert_eq!(heap.allocate(n), Some(ptr));
        heap.release(ptr.as_ptr());
    }
}

#[test]
fn exhaustion_boundary() {
    let heap = heap440();

    let mut pointers = Vec::new();
    while let Some(ptr) = heap.allocate(40) {
        pointers.push(ptr);
    }
    #[cfg(target_pointer_width = "64")]
    assert_eq!(pointers.len(), 5);
    assert_eq!(heap.try_allocate(40), Err(AllocError::Exhausted));
    check(&heap);

    let victim = pointers[pointers.len() / 2];
    heap.release(victim.as_ptr());
    assert_eq!(heap.allocate(40), Some(victim));
    assert_eq!(heap.allocate(40), None);
}

#[test]
fn split_is_refused_for_tiny_remainders() {
    let heap = heap440();
    let whole = 440 - HEADER_SIZE;

    // the remainder would be exactly one header
    let ptr = heap.allocate(whole - 2 * HEADER_SIZE).unwrap();
    assert_eq!(layout(&heap), [(whole, false)]);
    heap.release(ptr.as_ptr());

    // the remainder would be a word less than a header
    let ptr = heap.allocate(whole - 2 * HEADER_SIZE + 8).unwrap();
    assert_eq!(layout(&heap), [(whole, false)]);
    heap.release(ptr.as_ptr());

    // the remainder would be one word larger than a header
    heap.allocate(whole - 2 * HEADER_SIZE - 8).unwrap();
    assert_eq!(layout(&heap).len(), 2);
    check(&heap);
}

#[test]
fn granted_size_covers_request() {
    let heap = Allocator::<8192, _>::with_source(region(8192));
    for n in 1..=64 {
        let ptr = heap.allocate(n).unwrap();
        let block = heap
            .blocks()
            .find(|block| block.payload == ptr)
            .unwrap();
        assert!(!block.freed);
        assert!(block.size >= listalloc::align(n));
        assert_eq!(ptr.as_ptr() as usize % 8, 0);
    }
    check(&heap);
}

#[test]
fn coalescing_restores_a_single_block() {
    let heap = Allocator::<1024, _>::with_source(region(1024));
    let pointers: Vec<_> = (1..=8).map(|n| heap.allocate(n * 8).unwrap()).collect();

    // release every other block first, then the rest in reverse
    for ptr in pointers.iter().step_by(2) {
        heap.release(ptr.as_ptr());
        check(&heap);
    }
    for ptr in pointers.iter().skip(1).step_by(2).rev() {
        heap.release(ptr.as_ptr());
        check(&heap);
    }
    assert_eq!(layout(&heap), [(1024 - HEADER_SIZE, true)]);
}

#[test]
fn random_workload_keeps_invariants() {
    let heap = Allocator::<8192, _>::with_source(region(8192));
    let mut live = Vec::new();
    let mut seed = 0x2545_f491_4f6c_dd1du64;
    let mut random = move || {
        seed ^= seed << 13;
        seed ^= seed >> 7;
        seed ^= seed << 17;
        seed
    };

    for _ in 0..2000 {
        let value = random();
        if value % 3 == 0 && !live.is_empty() {
            let index = (value as usize / 3) % live.len();
            let (ptr, n, fill): (std::ptr::NonNull<u8>, usize, u8) = live.swap_remove(index);
            let data = unsafe { std::slice::from_raw_parts(ptr.as_ptr(), n) };
            assert!(data.iter().all(|&byte| byte == fill), "payload clobbered");
            heap.release(ptr.as_ptr());
        } else {
            let n = (value % 300) as usize + 1;
            if let Some(ptr) = heap.allocate(n) {
                let fill = value as u8;
                unsafe { ptr.as_ptr().write_bytes(fill, n) };
                live.push((ptr, n, fill));
            }
        }
        check(&heap);
    }

    for (ptr, _, _) in live {
        heap.release(ptr.as_ptr());
    }
    assert_eq!(layout(&heap), [(8192 - HEADER_SIZE, true)]);
}
