use super::*;
use std::sync::atomic::{AtomicUsize, Ordering};

#[test]
fn test_par_rows_mut_offsets() {
    let width = 10;
    let height = 23;
    let mut data: Vec<usize> = vec![0; width * height];

    par_rows_mut(&mut data, width).for_each(|(first_row, chunk)| {
        assert_eq!(chunk.len() % width, 0, "Chunk not row-aligned");
        for (local_y, row) in chunk.chunks_mut(width).enumerate() {
            let y = first_row + local_y;
            for (x, value) in row.iter_mut().enumerate() {
                *value = y * width + x;
            }
        }
    });

    for (i, &v) in data.iter().enumerate() {
        assert_eq!(v, i);
    }
}

#[test]
fn test_par_rows_mut_interleaved_channels() {
    let row_len = 7 * 3;
    let mut data = vec![0u8; row_len * 5];

    par_rows_mut(&mut data, row_len).for_each(|(first_row, chunk)| {
        for (local_y, row) in chunk.chunks_mut(row_len).enumerate() {
            row.fill((first_row + local_y) as u8);
        }
    });

    for (y, row) in data.chunks(row_len).enumerate() {
        assert!(row.iter().all(|&v| v == y as u8));
    }
}

#[test]
#[should_panic(expected = "buffer is not row-aligned")]
fn test_par_rows_mut_misaligned_panics() {
    let mut data = vec![0u8; 11];
    par_rows_mut(&mut data, 4).for_each(|_| {});
}

#[test]
fn test_try_par_map_limited_empty() {
    let items: Vec<i32> = vec![];
    let result: Result<Vec<i32>, &str> = try_par_map_limited(&items, 3, |&x| Ok(x));
    assert!(result.unwrap().is_empty());
}

#[test]
#[should_panic(expected = "max_concurrent must be > 0")]
fn test_try_par_map_limited_zero_panics() {
    let _: Result<Vec<i32>, &str> = try_par_map_limited(&[1, 2, 3], 0, |&x| Ok(x));
}

#[test]
fn test_try_par_map_limited_concurrency_cap() {
    let items: Vec<i32> = (0..20).collect();
    let in_flight = AtomicUsize::new(0);
    let max_observed = AtomicUsize::new(0);

    let result: Result<Vec<i32>, &str> = try_par_map_limited(&items, 3, |&x| {
        let current = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        max_observed.fetch_max(current, Ordering::SeqCst);
        std::thread::sleep(std::time::Duration::from_millis(5));
        in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(x)
    });

    assert_eq!(result.unwrap(), items);
    let max = max_observed.load(Ordering::SeqCst);
    assert!(max <= 3, "max in-flight was {max}, expected <= 3");
}

#[test]
fn test_try_par_map_limited_ok() {
    let items: Vec<i32> = (0..10).collect();
    let result: Result<Vec<i32>, &str> = try_par_map_limited(&items, 3, |&x| Ok(x * 2));
    assert_eq!(result.unwrap(), vec![0, 2, 4, 6, 8, 10, 12, 14, 16, 18]);
}

#[test]
fn test_try_par_map_limited_returns_first_error_in_order() {
    let items: Vec<i32> = (0..10).collect();
    let result: Result<Vec<i32>, String> = try_par_map_limited(&items, 10, |&x| {
        if x == 4 || x == 7 {
            Err(format!("bad {x}"))
        } else {
            Ok(x)
        }
    });
    assert_eq!(result.unwrap_err(), "bad 4");
}

#[test]
fn test_try_par_map_limited_stops_after_failing_chunk() {
    let items: Vec<i32> = (0..9).collect();
    let visited = AtomicUsize::new(0);
    let result: Result<Vec<i32>, &str> = try_par_map_limited(&items, 3, |&x| {
        visited.fetch_add(1, Ordering::SeqCst);
        if x == 1 { Err("bad") } else { Ok(x) }
    });
    assert!(result.is_err());
    assert_eq!(visited.load(Ordering::SeqCst), 3);
}
