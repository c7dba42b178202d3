use gcroots::{EternalHandles, HandleConfig, Isolate};

#[test]
fn eternal_handles() {
    const ETERNAL_HANDLE_COUNT: usize = 2047;
    let mut isolate = Isolate::new();
    let mut indices = Vec::with_capacity(ETERNAL_HANDLE_COUNT);

    for i in 0..ETERNAL_HANDLE_COUNT {
        // Garbage in between moves every survivor during compaction.
        let _garbage = isolate.heap_mut().alloc(String::from("garbage"));
        let object = isolate.heap_mut().alloc(i as i64).erase();
        let index = isolate.eternal_handles_mut().create(object);
        assert_eq!(index, i);
        indices.push(index);
    }

    let stats = isolate.collect_all_garbage();
    assert_eq!(stats.collected, ETERNAL_HANDLE_COUNT);
    assert!(stats.moved > 0);

    let eternal = isolate.eternal_handles();
    assert_eq!(eternal.number_of_handles(), ETERNAL_HANDLE_COUNT);
    for (i, index) in indices.into_iter().enumerate() {
        let object = eternal.get(index).expect("eternal handle is never released");
        assert_eq!(isolate.heap().get_erased::<i64>(object), Some(&(i as i64)));
    }
}

#[test]
fn indices_beyond_the_pool_are_empty() {
    let mut eternal = EternalHandles::new();
    assert_eq!(eternal.get(0), None);

    assert_eq!(eternal.create(11), 0);
    assert_eq!(eternal.get(0), Some(11));
    assert_eq!(eternal.get(1), None);
    assert_eq!(eternal.get(usize::MAX), None);
}

#[test]
fn indices_span_blocks_densely() {
    let config = HandleConfig {
        eternal_block_size: 8,
        ..HandleConfig::default()
    };
    let mut eternal = EternalHandles::with_config(&config);
    let indices: Vec<_> = (0..20).map(|object| eternal.create(object)).collect();

    assert_eq!(indices, (0..20).collect::<Vec<_>>());
    assert_eq!(eternal.block_count(), 3);
    for index in indices {
        assert_eq!(eternal.get(index), Some(index));
    }

    let mut visited = Vec::new();
    eternal.iterate_roots(|index, object| visited.push((index, object)));
    assert_eq!(visited.len(), 20);
    assert!(visited.iter().all(|&(index, object)| index == object));
}

#[test]
fn eternal_roots_survive_repeated_collections() {
    let mut isolate = Isolate::new();
    let object = isolate.heap_mut().alloc(String::from("forever")).erase();
    let index = isolate.eternal_handles_mut().create(object);

    for _ in 0..3 {
        let stats = isolate.collect_all_garbage();
        assert_eq!(stats.collected, 0);
    }
    let object = isolate
        .eternal_handles()
        .get(index)
        .expect("eternal handle survives");
    assert_eq!(
        isolate.heap().get_erased::<String>(object).map(String::as_str),
        Some("forever")
    );
    assert_eq!(isolate.collections(), 3);
}
