//! Two peers on loopback discovering each other over a private multicast
//! group, exercising announcement, discovery, watchers, address
//! resolution, withdrawal and shutdown end to end.

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddrV4, SocketAddrV6};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::timeout;

use mdns_peer::message::RData;
use mdns_peer::{Config, Mdns, ServiceInstance};

const SERVICE: &str = "veyronns";

#[derive(Clone)]
struct Instance {
    host: &'static str,
    port: u16,
    txt: &'static [&'static str],
}

async fn create_peer(inst: &Instance) -> Mdns {
    // A private group keeps the test off the real mDNS port; loopback-only
    // keeps it off the LAN.
    let config = Config::new(inst.host)
        .with_ipv4_group(SocketAddrV4::new(Ipv4Addr::new(224, 0, 0, 254), 9999))
        .with_ipv6_group(SocketAddrV6::new(
            Ipv6Addr::new(0xff02, 0, 0, 0, 0, 0, 0, 0xff),
            9998,
            0,
            0,
        ))
        .with_loopback_only(true);
    let peer = Mdns::new(config).await.expect("peer construction");
    peer.add_service(SERVICE, inst.host, inst.port, inst.txt)
        .await
        .expect("add_service");
    peer
}

fn host_fqdn(host: &str) -> String {
    format!("{host}.local.")
}

// Check that `discovered` matches `wants` exactly: every wanted instance
// has a matching SRV and TXT, and nothing unexpected showed up. A want
// with port 0 and no txt matches a removal (empty record sets).
fn check_discovered(
    who: &str,
    discovered: &[ServiceInstance],
    wants: &[Instance],
) -> Result<(), String> {
    if discovered.len() != wants.len() {
        return Err(format!(
            "{who} found {} instances, but expected {}: {discovered:?}",
            discovered.len(),
            wants.len()
        ));
    }

    let mut found_srv = vec![false; wants.len()];
    let mut found_txt = vec![false; wants.len()];
    for x in discovered {
        if x.srv_rrs.is_empty() && x.txt_rrs.is_empty() {
            for (i, want) in wants.iter().enumerate() {
                if x.name == want.host && want.port == 0 && want.txt.is_empty() {
                    found_srv[i] = true;
                    found_txt[i] = true;
                }
            }
            continue;
        }

        for rr in &x.srv_rrs {
            let RData::Srv(srv) = &rr.body else {
                return Err(format!("{who}: non-SRV record in srv_rrs: {rr}"));
            };
            let mut matched = false;
            for (i, want) in wants.iter().enumerate() {
                if x.name == want.host
                    && srv.target.data == host_fqdn(want.host)
                    && srv.port == want.port
                {
                    matched = true;
                    found_srv[i] = true;
                }
            }
            if !matched {
                return Err(format!(
                    "{who} found unexpected SRV {}:{}",
                    srv.target, srv.port
                ));
            }
        }
        for rr in &x.txt_rrs {
            let RData::Txt(txt) = &rr.body else {
                return Err(format!("{who}: non-TXT record in txt_rrs: {rr}"));
            };
            let mut matched = false;
            for (i, want) in wants.iter().enumerate() {
                if x.name == want.host && txt.txt.iter().map(String::as_str).eq(want.txt.iter().copied())
                {
                    matched = true;
                    found_txt[i] = true;
                }
            }
            if !matched {
                return Err(format!("{who} found unexpected TXT {:?}", txt.txt));
            }
        }
    }

    for (i, want) in wants.iter().enumerate() {
        if !found_srv[i] {
            return Err(format!(
                "{who} didn't find SRV {}:{}",
                host_fqdn(want.host),
                want.port
            ));
        }
        if !found_txt[i] {
            return Err(format!("{who} didn't find TXT {:?}", want.txt));
        }
    }
    Ok(())
}

// Collect watcher deltas until every wanted instance arrived, or 5s pass.
async fn watch_for(
    who: &str,
    rx: &mut mpsc::Receiver<ServiceInstance>,
    wants: &[Instance],
) -> Result<(), String> {
    let mut discovered = vec![];
    while discovered.len() < wants.len() {
        match timeout(Duration::from_secs(5), rx.recv()).await {
            Ok(Some(inst)) => discovered.push(inst),
            Ok(None) => break,
            Err(_) => break,
        }
    }
    check_discovered(who, &discovered, wants)
}

async fn watch_for_removed(
    who: &str,
    rx: &mut mpsc::Receiver<ServiceInstance>,
    wants: &[Instance],
) -> Result<(), String> {
    let removed: Vec<Instance> = wants
        .iter()
        .map(|w| Instance {
            host: w.host,
            port: 0,
            txt: &[],
        })
        .collect();
    watch_for(who, rx, &removed).await
}

#[tokio::test(flavor = "multi_thread")]
async fn test_two_peers() {
    let _ = env_logger::builder().is_test(true).try_init();

    let instances = [
        Instance {
            host: "system1",
            port: 666,
            txt: &[""],
        },
        Instance {
            host: "system2",
            port: 667,
            txt: &["hoo haa", "haa hoo"],
        },
    ];

    // First peer announces; its watcher reports its own instance.
    let s1 = create_peer(&instances[0]).await;
    let (mut w1, _w1_handle) = s1.service_member_watch(SERVICE);
    watch_for("system1 watcher", &mut w1, &instances[..1])
        .await
        .unwrap();

    let s2 = create_peer(&instances[1]).await;

    // Multicast on each interface our desire to know about instances.
    s1.subscribe_to_service(SERVICE).await;
    s2.subscribe_to_service(SERVICE).await;

    // Wait for all messages to get out and get reflected back.
    tokio::time::sleep(Duration::from_secs(3)).await;

    // Both peers see both instances.
    check_discovered("system1", &s1.service_discovery(SERVICE), &instances).unwrap();
    check_discovered("system2", &s2.service_discovery(SERVICE), &instances).unwrap();

    // Addresses resolve both ways.
    let ips = s1.resolve_address("system2").await.unwrap();
    assert!(!ips.is_empty(), "system1 found no ips for system2");
    let ips = s2.resolve_address("system1").await.unwrap();
    assert!(!ips.is_empty(), "system2 found no ips for system1");

    // The watcher learned about the second system.
    watch_for("system1 watcher", &mut w1, &instances[1..])
        .await
        .unwrap();

    // A second watcher for the same service reports the current set.
    let (mut w2, w2_handle) = s1.service_member_watch(SERVICE);
    watch_for("second watcher", &mut w2, &instances)
        .await
        .unwrap();

    // A stopped watcher closes its channel.
    w2_handle.stop();
    assert!(
        w2.recv().await.is_none(),
        "watcher didn't close the channel"
    );

    // Withdraw one service and wait for the goodbye to take effect.
    s1.remove_service(SERVICE, instances[0].host, instances[0].port, instances[0].txt)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_secs(3)).await;

    // The watcher sees the removal, discovery no longer lists it.
    watch_for_removed("system1 watcher", &mut w1, &instances[..1])
        .await
        .unwrap();
    check_discovered("system1", &s1.service_discovery(SERVICE), &instances[1..]).unwrap();
    check_discovered("system2", &s2.service_discovery(SERVICE), &instances[1..]).unwrap();

    s1.stop().await;
    s2.stop().await;

    // Stop is idempotent.
    s1.stop().await;
}
