use taskfarm::{
    primes::{self, SearchRange},
    FarmConfig,
};

const PRIMES_TO_100: [i64; 25] = [
    2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43, 47, 53, 59, 61, 67, 71, 73, 79, 83, 89, 97,
];

#[tokio::test]
async fn primes_up_to_100_for_any_farm_size() {
    for participants in 2..=6 {
        let config = FarmConfig::new(participants).unwrap();
        let report = primes::search(&config, SearchRange::new(2, 100))
            .await
            .unwrap();

        assert_eq!(report.sorted(), PRIMES_TO_100, "participants: {participants}");
        assert_eq!(report.results, 99);
        assert_eq!(report.dispatched.values().sum::<usize>(), 99);
    }
}

#[tokio::test]
async fn primes_up_to_10_with_two_workers() {
    let config = FarmConfig::new(3).unwrap();
    let report = primes::search(&config, SearchRange::new(2, 10))
        .await
        .unwrap();

    assert_eq!(report.sorted(), vec![2, 3, 5, 7]);
    assert_eq!(report.results, 9);
}

#[tokio::test]
async fn arrival_order_holds_the_same_primes() {
    let config = FarmConfig::new(4).unwrap();
    let report = primes::search(&config, SearchRange::new(2, 100))
        .await
        .unwrap();

    let mut arrived = report.primes.clone();
    arrived.sort_unstable();
    assert_eq!(arrived, report.sorted());
}

#[tokio::test]
async fn empty_range_still_stops_every_worker() {
    let config = FarmConfig::new(5).unwrap();
    let report = primes::search(&config, SearchRange::new(10, 2))
        .await
        .unwrap();

    assert!(report.primes.is_empty());
    assert_eq!(report.results, 0);
    assert!(report.dispatched.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn larger_range_on_multi_threaded_runtime() {
    let config = FarmConfig::new(6).unwrap();
    let report = primes::search(&config, SearchRange::new(-50, 10_000))
        .await
        .unwrap();

    // There are 1229 primes below 10 000.
    assert_eq!(report.sorted().len(), 1229);
    assert_eq!(report.results, 10_051);
}
