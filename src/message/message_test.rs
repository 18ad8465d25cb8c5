use super::*;

fn decode_hex(s: &str) -> Vec<u8> {
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
        .collect()
}

// A valid SRV reply with five answers.
const SRV_REPLY: &str = "0901818000010005000000000c5f786d70702d736572766572045f74637006676f6f67\
6c6503636f6d0000210001c00c002100010000012c00210014000014950c786d70702d\
73657276657234016c06676f6f676c6503636f6d00c00c002100010000012c00210014\
000014950c786d70702d73657276657232016c06676f6f676c6503636f6d00c00c0021\
00010000012c00210014000014950c786d70702d73657276657233016c06676f6f676c\
6503636f6d00c00c002100010000012c00200005000014950b786d70702d7365727665\
72016c06676f6f676c6503636f6d00c00c002100010000012c00210014000014950c78\
6d70702d73657276657231016c06676f6f676c6503636f6d00";

// The same reply with the final answer's RDLENGTH mutated to a bogus value
// (the capital FF below instead of the proper 21).
const SRV_CORRUPT_REPLY: &str = "0901818000010005000000000c5f786d70702d736572766572045f74637006676f6f67\
6c6503636f6d0000210001c00c002100010000012c00210014000014950c786d70702d\
73657276657234016c06676f6f676c6503636f6d00c00c002100010000012c00210014\
000014950c786d70702d73657276657232016c06676f6f676c6503636f6d00c00c0021\
00010000012c00210014000014950c786d70702d73657276657233016c06676f6f676c\
6503636f6d00c00c002100010000012c00200005000014950b786d70702d7365727665\
72016c06676f6f676c6503636f6d00c00c002100010000012c00FF0014000014950c78\
6d70702d73657276657231016c06676f6f676c6503636f6d00";

#[test]
fn test_txt_round_trip() {
    let texts = vec![
        "the rain in spain".to_owned(),
        "falls mainly on the plane".to_owned(),
    ];
    let rr = Resource {
        header: ResourceHeader {
            name: Name::new("x.local.").unwrap(),
            typ: DnsType::Txt,
            class: DnsClass(CLASS_INET.0 | CLASS_CACHE_FLUSH),
            ttl: 10000,
            length: 0,
        },
        body: RData::Txt(TxtResource { txt: texts.clone() }),
    };

    let buf = rr.pack(vec![], &mut None, 0).unwrap();
    let (out, off) = Resource::unpack(&buf, 0).unwrap();
    assert_eq!(off, buf.len());

    assert_eq!(out.header.name.data, "x.local.");
    assert_eq!(out.header.typ, DnsType::Txt);
    assert_eq!(out.header.ttl, 10000);
    assert!(out.header.class.cache_flush());
    assert_eq!(out.header.class.base(), CLASS_INET.0);
    match out.body {
        RData::Txt(ref t) => assert_eq!(t.txt, texts),
        ref other => panic!("expected TXT body, got {other}"),
    }
}

#[test]
fn test_rdata_round_trips() {
    let cases = vec![
        (DnsType::A, RData::A(AResource { a: [192, 168, 7, 9] })),
        (
            DnsType::Aaaa,
            RData::Aaaa(AaaaResource {
                aaaa: [0xfe, 0x80, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1],
            }),
        ),
        (
            DnsType::Ptr,
            RData::Ptr(PtrResource {
                ptr: Name::new("y.local.").unwrap(),
            }),
        ),
        (
            DnsType::Srv,
            RData::Srv(SrvResource {
                priority: 0,
                weight: 0,
                port: 666,
                target: Name::new("x.local.").unwrap(),
            }),
        ),
        (
            DnsType::Txt,
            RData::Txt(TxtResource {
                txt: vec!["".to_owned()],
            }),
        ),
    ];

    for (typ, body) in cases {
        let rr = Resource {
            header: ResourceHeader {
                name: Name::new("x.local.").unwrap(),
                typ,
                class: CLASS_INET,
                ttl: 120,
                length: 0,
            },
            body: body.clone(),
        };
        let buf = rr.pack(vec![], &mut None, 0).unwrap();
        let (out, off) = Resource::unpack(&buf, 0).unwrap();
        assert_eq!(off, buf.len(), "{typ} consumed the whole buffer");
        assert_eq!(out.header.typ, typ);
        assert_eq!(out.body, body, "{typ} round trip");
    }
}

#[test]
fn test_parse_srv_reply() {
    let data = decode_hex(SRV_REPLY);
    let mut msg = Message::default();
    msg.unpack(&data).unwrap();
    let _ = msg.to_string(); // exercise this code path

    assert_eq!(msg.answers.len(), 5);
    for (idx, rr) in msg.answers.iter().enumerate() {
        assert_eq!(rr.header.typ, DnsType::Srv, "answer[{idx}] type");
        assert!(
            matches!(rr.body, RData::Srv(_)),
            "answer[{idx}] should be SRV"
        );
    }

    let matched = msg.answers_matching("_xmpp-server._tcp.google.com.", DnsType::Srv);
    assert_eq!(matched.len(), 5);

    // Repack and unpack.
    let data2 = msg.pack().unwrap();
    let mut msg2 = Message::default();
    msg2.unpack(&data2).unwrap();
    assert_eq!(msg, msg2, "repacked message differs from original");
}

#[test]
fn test_parse_corrupt_srv_reply() {
    let data = decode_hex(SRV_CORRUPT_REPLY);
    let mut msg = Message::default();
    msg.unpack(&data).unwrap();
    let _ = msg.to_string(); // exercise this code path

    assert_eq!(msg.answers.len(), 5);
    for (idx, rr) in msg.answers.iter().enumerate() {
        assert_eq!(rr.header.typ, DnsType::Srv, "answer[{idx}] type");
        if idx == 4 {
            assert!(
                matches!(rr.body, RData::Opaque(_)),
                "answer[4] should degrade to an opaque body"
            );
        } else {
            assert!(
                matches!(rr.body, RData::Srv(_)),
                "answer[{idx}] should be SRV"
            );
        }
    }

    let matched = msg.answers_matching("_xmpp-server._tcp.google.com.", DnsType::Srv);
    assert_eq!(matched.len(), 4);
}

#[test]
fn test_question_message_round_trip() {
    let msg = Message {
        header: Header::default(),
        questions: vec![
            Question {
                name: Name::new("host.local.").unwrap(),
                typ: DnsType::A,
                class: CLASS_INET,
            },
            Question {
                name: Name::new("host.local.").unwrap(),
                typ: DnsType::Aaaa,
                class: CLASS_INET,
            },
        ],
        ..Default::default()
    };

    let data = msg.pack().unwrap();
    let mut out = Message::default();
    out.unpack(&data).unwrap();

    assert!(!out.header.response);
    assert_eq!(out.questions.len(), 2);
    assert_eq!(out.questions[0].name.data, "host.local.");
    assert_eq!(out.questions[0].typ, DnsType::A);
    assert_eq!(out.questions[1].typ, DnsType::Aaaa);
}

#[test]
fn test_name_compression() {
    // Two records sharing a suffix should compress, and both names must
    // survive the round trip.
    let msg = Message {
        header: Header {
            response: true,
            authoritative: true,
            ..Default::default()
        },
        answers: vec![
            Resource {
                header: ResourceHeader {
                    name: Name::new("chat.local.").unwrap(),
                    typ: DnsType::Ptr,
                    class: CLASS_INET,
                    ttl: 120,
                    length: 0,
                },
                body: RData::Ptr(PtrResource {
                    ptr: Name::new("system1.chat.local.").unwrap(),
                }),
            },
            Resource {
                header: ResourceHeader {
                    name: Name::new("system1.chat.local.").unwrap(),
                    typ: DnsType::Txt,
                    class: CLASS_INET,
                    ttl: 120,
                    length: 0,
                },
                body: RData::Txt(TxtResource {
                    txt: vec!["hoo haa".to_owned()],
                }),
            },
        ],
        ..Default::default()
    };

    let plain: usize = 12
        + msg
            .answers
            .iter()
            .map(|rr| rr.pack(vec![], &mut None, 0).unwrap().len())
            .sum::<usize>();
    let data = msg.pack().unwrap();
    assert!(data.len() < plain, "compression saved nothing");

    let mut out = Message::default();
    out.unpack(&data).unwrap();
    assert_eq!(out.answers.len(), 2);
    assert_eq!(out.answers[0].header.name.data, "chat.local.");
    match &out.answers[0].body {
        RData::Ptr(p) => assert_eq!(p.ptr.data, "system1.chat.local."),
        other => panic!("expected PTR, got {other}"),
    }
    assert_eq!(out.answers[1].header.name.data, "system1.chat.local.");
}
