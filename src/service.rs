//! Local services: the records this peer is authoritative for.
//!
//! Each registered service expands into the conventional DNS-SD set: a PTR
//! from the service name to the instance name, an SRV and TXT under the
//! instance name, and A/AAAA records for the host on every endpoint
//! address. The PTR is a shared record and never carries the cache-flush
//! bit; the per-instance records do.

use std::net::IpAddr;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::config::{INITIAL_BACKOFF, MAX_BACKOFF, RESPONSE_TTL};
use crate::error::{Error, Result};
use crate::message::{
    AResource, AaaaResource, CLASS_CACHE_FLUSH, CLASS_INET, DnsClass, DnsType, Header, Message,
    Name, PtrResource, RData, Resource, ResourceHeader, SrvResource, TxtResource,
};

pub(crate) fn host_fqdn(host: &str) -> String {
    format!("{}.local.", host.trim_end_matches('.'))
}

pub(crate) fn service_fqdn(service: &str) -> String {
    format!("{}.local.", service.trim_end_matches('.'))
}

pub(crate) fn instance_fqdn(host: &str, service: &str) -> String {
    format!(
        "{}.{}.local.",
        host.trim_end_matches('.'),
        service.trim_end_matches('.')
    )
}

/// An unsolicited authoritative response carrying `answers`.
pub(crate) fn response_message(answers: Vec<Resource>) -> Message {
    Message {
        header: Header {
            response: true,
            authoritative: true,
            ..Default::default()
        },
        answers,
        ..Default::default()
    }
}

struct LocalService {
    service: String,
    host: String,
    port: u16,
    txt: Vec<String>,
    next_announce: Instant,
    period: Duration,
}

impl LocalService {
    // The authoritative record set for this service, at the given TTL.
    // TTL 0 produces the goodbye set.
    fn records(&self, addrs: &[IpAddr], ttl: u32) -> Vec<Resource> {
        let shared = CLASS_INET;
        let unique = DnsClass(CLASS_INET.0 | CLASS_CACHE_FLUSH);
        let header = |name: String, typ: DnsType, class: DnsClass| ResourceHeader {
            name: Name { data: name },
            typ,
            class,
            ttl,
            length: 0,
        };

        let service = service_fqdn(&self.service);
        let instance = instance_fqdn(&self.host, &self.service);
        let host = host_fqdn(&self.host);

        let mut rrs = vec![
            Resource {
                header: header(service, DnsType::Ptr, shared),
                body: RData::Ptr(PtrResource {
                    ptr: Name {
                        data: instance.clone(),
                    },
                }),
            },
            Resource {
                header: header(instance.clone(), DnsType::Srv, unique),
                body: RData::Srv(SrvResource {
                    priority: 0,
                    weight: 0,
                    port: self.port,
                    target: Name { data: host.clone() },
                }),
            },
            Resource {
                header: header(instance, DnsType::Txt, unique),
                body: RData::Txt(TxtResource {
                    txt: self.txt.clone(),
                }),
            },
        ];
        for addr in addrs {
            let rr = match addr {
                IpAddr::V4(ip) => Resource {
                    header: header(host.clone(), DnsType::A, unique),
                    body: RData::A(AResource { a: ip.octets() }),
                },
                IpAddr::V6(ip) => Resource {
                    header: header(host.clone(), DnsType::Aaaa, unique),
                    body: RData::Aaaa(AaaaResource { aaaa: ip.octets() }),
                },
            };
            rrs.push(rr);
        }
        rrs
    }
}

pub(crate) struct ServiceRegistry {
    host_name: String,
    services: Mutex<Vec<LocalService>>,
}

impl ServiceRegistry {
    pub(crate) fn new(host_name: &str) -> Self {
        Self {
            host_name: host_name.to_owned(),
            services: Mutex::new(vec![]),
        }
    }

    /// Registers a service and returns its announce record set. An empty
    /// host falls back to the peer's own host name. Re-adding the same
    /// (service, host, port) replaces the old registration.
    pub(crate) fn add(
        &self,
        service: &str,
        host: &str,
        port: u16,
        txt: &[&str],
        addrs: &[IpAddr],
        now: Instant,
    ) -> Vec<Resource> {
        let host = if host.is_empty() {
            self.host_name.clone()
        } else {
            host.to_owned()
        };
        let ls = LocalService {
            service: service.to_owned(),
            host: host.clone(),
            port,
            txt: txt.iter().map(|s| s.to_string()).collect(),
            // The second announce goes out a second from now; the gap
            // doubles from there.
            next_announce: now + INITIAL_BACKOFF,
            period: INITIAL_BACKOFF,
        };
        let rrs = ls.records(addrs, RESPONSE_TTL);

        let mut services = self.services.lock().unwrap();
        services.retain(|s| !(s.service == service && s.host == host && s.port == port));
        services.push(ls);
        rrs
    }

    /// Deregisters a service and returns its goodbye (TTL=0) record set.
    pub(crate) fn remove(
        &self,
        service: &str,
        host: &str,
        port: u16,
        txt: &[&str],
        addrs: &[IpAddr],
    ) -> Result<Vec<Resource>> {
        let mut services = self.services.lock().unwrap();
        let pos = services
            .iter()
            .position(|s| {
                s.service == service
                    && s.host == host
                    && s.port == port
                    && s.txt.iter().map(String::as_str).eq(txt.iter().copied())
            })
            .ok_or(Error::ErrServiceNotFound)?;
        let ls = services.remove(pos);
        Ok(ls.records(addrs, 0))
    }

    /// Goodbye record sets for everything registered, clearing the
    /// registry. Used at shutdown.
    pub(crate) fn remove_all(&self, addrs: &[IpAddr]) -> Vec<Vec<Resource>> {
        let mut services = self.services.lock().unwrap();
        services
            .drain(..)
            .map(|ls| ls.records(addrs, 0))
            .collect()
    }

    /// Record sets of every service whose re-announce is due, pushing each
    /// schedule along its doubling backoff.
    pub(crate) fn due_announcements(&self, now: Instant, addrs: &[IpAddr]) -> Vec<Vec<Resource>> {
        let mut out = vec![];
        let mut services = self.services.lock().unwrap();
        for s in services.iter_mut() {
            if s.next_announce <= now {
                out.push(s.records(addrs, RESPONSE_TTL));
                s.period = (s.period * 2).min(MAX_BACKOFF);
                s.next_announce = now + s.period;
            }
        }
        out
    }

    /// Builds the response to an inbound query, if any question matches the
    /// authoritative set. Returns the response and whether the querier
    /// asked for a unicast reply.
    ///
    /// A matched PTR pulls the instance's whole record set into the answer,
    /// so a browsing peer gets SRV/TXT/addresses in one round trip.
    /// Known-answer suppression: a record the querier already holds at at
    /// least half its lifetime is omitted (RFC 6762 §7.1).
    pub(crate) fn handle_query(&self, query: &Message, addrs: &[IpAddr]) -> Option<(Message, bool)> {
        let services = self.services.lock().unwrap();
        let mut answers: Vec<Resource> = vec![];
        let mut unicast = false;

        for s in services.iter() {
            let rrs = s.records(addrs, RESPONSE_TTL);
            for q in &query.questions {
                let qname = q.name.data.to_lowercase();
                for rr in &rrs {
                    if rr.header.name.data.to_lowercase() != qname
                        || !q.typ.matches(rr.header.typ)
                    {
                        continue;
                    }
                    let candidates: &[Resource] = if rr.header.typ == DnsType::Ptr {
                        &rrs
                    } else {
                        std::slice::from_ref(rr)
                    };
                    for rr in candidates {
                        if known_answer(query, rr) || answers.contains(rr) {
                            continue;
                        }
                        if q.class.cache_flush() {
                            unicast = true;
                        }
                        answers.push(rr.clone());
                    }
                }
            }
        }

        if answers.is_empty() {
            None
        } else {
            Some((response_message(answers), unicast))
        }
    }
}

fn known_answer(query: &Message, rr: &Resource) -> bool {
    query.answers.iter().any(|ka| {
        ka.header.typ == rr.header.typ
            && ka.header.name.data.to_lowercase() == rr.header.name.data.to_lowercase()
            && ka.body == rr.body
            && ka.header.ttl >= rr.header.ttl / 2
    })
}
