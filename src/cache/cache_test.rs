use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::mpsc;

use super::*;
use crate::message::{
    CLASS_CACHE_FLUSH, CLASS_INET, DnsClass, DnsType, Name, PtrResource, RData, Resource,
    ResourceHeader, TxtResource,
};

fn txt(name: &str, class: u16, ttl: u32, strs: &[&str]) -> Resource {
    Resource {
        header: ResourceHeader {
            name: Name::new(name).unwrap(),
            typ: DnsType::Txt,
            class: DnsClass(class),
            ttl,
            length: 0,
        },
        body: RData::Txt(TxtResource {
            txt: strs.iter().map(|s| s.to_string()).collect(),
        }),
    }
}

fn ptr(name: &str, class: u16, ttl: u32, target: &str) -> Resource {
    Resource {
        header: ResourceHeader {
            name: Name::new(name).unwrap(),
            typ: DnsType::Ptr,
            class: DnsClass(class),
            ttl,
            length: 0,
        },
        body: RData::Ptr(PtrResource {
            ptr: Name::new(target).unwrap(),
        }),
    }
}

fn short() -> Vec<Resource> {
    vec![
        txt("x.local.", CLASS_INET.0, 2, &["the rain in spain"]),
        ptr("x.local.", CLASS_INET.0, 2, "y.local."),
    ]
}

fn long() -> Vec<Resource> {
    vec![
        txt("x.local.", CLASS_INET.0, 10000, &["falls mainly on the plain"]),
        ptr("x.local.", CLASS_INET.0, 10000, "z.local."),
    ]
}

fn override_set() -> Vec<Resource> {
    vec![
        txt(
            "x.local.",
            CLASS_INET.0 | CLASS_CACHE_FLUSH,
            10000,
            &["except on tuesday"],
        ),
        ptr(
            "x.local.",
            CLASS_INET.0 | CLASS_CACHE_FLUSH,
            10000,
            "q.local.",
        ),
    ]
}

fn goodbye_set() -> Vec<Resource> {
    vec![
        txt("x.local.", CLASS_INET.0, 0, &["except on tuesday"]),
        ptr("x.local.", CLASS_INET.0, 0, "q.local."),
    ]
}

// Compare two record sets ignoring order, by (type, payload).
fn same_records(got: &[Resource], want: &[Resource]) -> bool {
    got.len() == want.len()
        && want.iter().all(|w| {
            got.iter()
                .any(|g| g.header.typ == w.header.typ && g.body == w.body)
        })
}

#[test]
fn test_ttl_expiry() {
    let cache = RrCache::new();
    let t0 = Instant::now();

    for rr in short().iter().chain(long().iter()) {
        cache.add_at(rr, t0);
    }

    // Everything visible right away.
    let all: Vec<Resource> = short().into_iter().chain(long()).collect();
    let x = cache.matching_at("x.local.", DnsType::Any, t0);
    assert!(same_records(&x, &all), "{x:?} != {all:?}");

    // Type-filtered lookup returns only the TXT entries.
    let x = cache.matching_at("x.local.", DnsType::Txt, t0);
    assert!(same_records(&x, &[short()[0].clone(), long()[0].clone()]));

    // Past the short TTL only the long entries remain.
    let t5 = t0 + Duration::from_secs(5);
    let x = cache.matching_at("x.local.", DnsType::Any, t5);
    assert!(same_records(&x, &long()), "{x:?} != {:?}", long());
}

#[test]
fn test_cache_flush_override() {
    let cache = RrCache::new();
    let t0 = Instant::now();

    for rr in long() {
        cache.add_at(&rr, t0);
    }
    for rr in override_set() {
        cache.add_at(&rr, t0);
    }

    // The flush bit overrides rather than appends.
    let x = cache.matching_at("x.local.", DnsType::Any, t0);
    assert!(same_records(&x, &override_set()), "{x:?}");

    let x = cache.matching_at("x.local.", DnsType::Txt, t0);
    assert_eq!(x.len(), 1);
}

#[test]
fn test_goodbye() {
    let cache = RrCache::new();
    let t0 = Instant::now();

    for rr in override_set() {
        cache.add_at(&rr, t0);
    }
    for rr in goodbye_set() {
        cache.add_at(&rr, t0);
    }

    // Still visible inside the grace window.
    let x = cache.matching_at("x.local.", DnsType::Any, t0);
    assert_eq!(x.len(), 2);

    // Gone two seconds later.
    let t2 = t0 + Duration::from_secs(2);
    let x = cache.matching_at("x.local.", DnsType::Any, t2);
    assert!(x.is_empty(), "{x:?} != []");
}

#[test]
fn test_goodbye_matches_payload() {
    let cache = RrCache::new();
    let t0 = Instant::now();

    cache.add_at(&txt("x.local.", CLASS_INET.0, 120, &["keep me"]), t0);
    cache.add_at(&txt("x.local.", CLASS_INET.0, 120, &["drop me"]), t0);
    cache.add_at(&txt("x.local.", CLASS_INET.0, 0, &["drop me"]), t0);

    let t2 = t0 + Duration::from_secs(2);
    let x = cache.matching_at("x.local.", DnsType::Txt, t2);
    assert_eq!(x.len(), 1);
    assert_eq!(
        x[0].body,
        RData::Txt(TxtResource {
            txt: vec!["keep me".to_owned()]
        })
    );
}

#[test]
fn test_duplicate_refreshes_ttl() {
    let cache = RrCache::new();
    let t0 = Instant::now();

    cache.add_at(&txt("x.local.", CLASS_INET.0, 2, &["same"]), t0);
    cache.add_at(&txt("x.local.", CLASS_INET.0, 10000, &["same"]), t0);

    let x = cache.matching_at("x.local.", DnsType::Txt, t0);
    assert_eq!(x.len(), 1);
    assert_eq!(x[0].header.ttl, 10000);

    // The refreshed lifetime is in effect.
    let t5 = t0 + Duration::from_secs(5);
    assert_eq!(cache.matching_at("x.local.", DnsType::Txt, t5).len(), 1);
}

#[test]
fn test_names_are_case_insensitive() {
    let cache = RrCache::new();
    let t0 = Instant::now();

    cache.add_at(&txt("X.Local.", CLASS_INET.0, 120, &["mixed"]), t0);
    assert_eq!(cache.matching_at("x.local.", DnsType::Txt, t0).len(), 1);
    assert_eq!(cache.matching_at("X.LOCAL.", DnsType::Txt, t0).len(), 1);
}

#[test]
fn test_channel_lookup_sentinel() {
    let cache = RrCache::new();
    let t0 = Instant::now();
    for rr in long() {
        cache.add_at(&rr, t0);
    }

    let (tx, mut rx) = mpsc::channel(10);
    cache.lookup_at("x.local.", DnsType::Any, &tx, t0);

    let mut rrs = vec![];
    loop {
        match rx.try_recv().expect("sentinel must follow the records") {
            Some(rr) => rrs.push(rr),
            None => break,
        }
    }
    assert!(same_records(&rrs, &long()));
}

#[test]
fn test_channel_lookup_never_blocks() {
    let cache = RrCache::new();
    let t0 = Instant::now();
    for rr in short().iter().chain(long().iter()) {
        cache.add_at(rr, t0);
    }

    // A one-slot channel: the lookup must drop the excess and return.
    let (tx, mut rx) = mpsc::channel(1);
    cache.lookup_at("x.local.", DnsType::Any, &tx, t0);
    assert!(rx.try_recv().unwrap().is_some());
}

#[test]
fn test_change_hook() {
    let cache = RrCache::new();
    let t0 = Instant::now();
    let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(vec![]));

    let seen2 = Arc::clone(&seen);
    cache.set_change_hook(Some(Box::new(move |name| {
        seen2.lock().unwrap().push(name.to_owned());
    })));

    // Insertion fires the hook.
    cache.add_at(&txt("x.local.", CLASS_INET.0, 2, &["v1"]), t0);
    assert_eq!(*seen.lock().unwrap(), ["x.local."]);

    // A pure TTL refresh does not.
    cache.add_at(&txt("x.local.", CLASS_INET.0, 2, &["v1"]), t0);
    assert_eq!(seen.lock().unwrap().len(), 1);

    // Expiry does, once the janitor runs.
    cache.flush_expired_at(t0 + Duration::from_secs(3));
    assert_eq!(*seen.lock().unwrap(), ["x.local.", "x.local."]);

    cache.set_change_hook(None);
    cache.add_at(&txt("x.local.", CLASS_INET.0, 2, &["v2"]), t0);
    assert_eq!(seen.lock().unwrap().len(), 2);
}
