#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use url::Url;

    use crate::balancer::{Backend, BackendPool};

    fn pool(weights: &[u32]) -> BackendPool {
        let backends = weights
            .iter()
            .enumerate()
            .map(|(i, &weight)| {
                let url = Url::parse(&format!("http://localhost:{}", 9000 + i)).unwrap();
                Arc::new(Backend::new(url, weight))
            })
            .collect();
        BackendPool::new(backends)
    }

    fn tally(pool: &BackendPool, draws: usize) -> Vec<usize> {
        let mut counts = vec![0usize; pool.backends().len()];
        for _ in 0..draws {
            let picked = pool.pick().expect("a live backend must be picked");
            let index = pool
                .backends()
                .iter()
                .position(|b| Arc::ptr_eq(b, &picked))
                .unwrap();
            counts[index] += 1;
        }
        counts
    }

    #[test]
    fn distribution_follows_weights() {
        let pool = pool(&[2, 1]);
        let counts = tally(&pool, 30_000);

        assert!(
            (19_700..=20_300).contains(&counts[0]),
            "weight-2 backend drew {} of 30000",
            counts[0]
        );
        assert!(
            (9_700..=10_300).contains(&counts[1]),
            "weight-1 backend drew {} of 30000",
            counts[1]
        );
    }

    #[test]
    fn dead_backend_is_never_picked() {
        let pool = pool(&[1, 1]);
        pool.backends()[0].set_alive(false);

        let counts = tally(&pool, 1_000);
        assert_eq!(counts[0], 0, "a dead backend must be excluded");
        assert_eq!(counts[1], 1_000);
    }

    #[test]
    fn revived_backend_rejoins_the_rotation() {
        let pool = pool(&[1, 1]);
        pool.backends()[0].set_alive(false);
        let _ = tally(&pool, 100);

        pool.backends()[0].set_alive(true);
        let counts = tally(&pool, 1_000);

        assert!(counts[0] > 0, "revived backend never picked");
        assert!(counts[1] > 0, "surviving backend starved out");
    }

    #[test]
    fn no_live_backend_yields_none() {
        let pool = pool(&[2, 1]);
        for backend in pool.backends() {
            backend.set_alive(false);
        }

        assert!(pool.pick().is_none());
    }

    #[test]
    fn single_live_backend_always_wins() {
        let pool = pool(&[5]);
        for _ in 0..100 {
            let picked = pool.pick().unwrap();
            assert!(Arc::ptr_eq(&picked, &pool.backends()[0]));
        }
    }

    #[test]
    fn backend_host_is_the_authority() {
        let backend = Backend::new(Url::parse("http://localhost:8081").unwrap(), 1);
        assert_eq!(backend.host(), "localhost:8081");
    }
}
