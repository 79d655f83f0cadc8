use super::*;

use crate::prefix::{bits_of, mask};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;

/// Linear-scan reference: canonical `(network bits, len)` to next-hop.
#[derive(Clone, Default)]
struct Model {
    routes: BTreeMap<(u128, u8), NextHop>,
}

impl Model {
    fn insert(&mut self, network: &[u8], len: u8, next_hop: NextHop) -> Option<NextHop> {
        self.routes.insert((bits_of(network) & mask(len), len), next_hop)
    }

    fn delete(&mut self, network: &[u8], len: u8) -> Option<NextHop> {
        self.routes.remove(&(bits_of(network) & mask(len), len))
    }

    fn lookup(&self, addr: &[u8]) -> Option<NextHop> {
        let bits = bits_of(addr);
        self.routes
            .iter()
            .filter(|(&(network, len), _)| bits & mask(len) == network)
            .max_by_key(|(&(_, len), _)| len)
            .map(|(_, &next_hop)| next_hop)
    }
}

fn tables_for(family: Family) -> Vec<Table> {
    Algorithm::for_family(family)
        .map(|algorithm| Table::new(family, algorithm).unwrap())
        .collect()
}

#[derive(Clone, Debug)]
enum Op {
    Insert(Vec<u8>, u8, NextHop),
    Delete(Vec<u8>, u8),
    Lookup(Vec<u8>),
}

// Addresses are drawn from a few clusters so prefixes overlap and nest.
fn ipv4_addr() -> impl Strategy<Value = Vec<u8>> + Clone {
    (
        prop::sample::select(vec![0u8, 10, 192, 255]),
        0u8..4,
        prop::sample::select(vec![0u8, 1, 128, 255]),
        any::<u8>(),
    )
        .prop_map(|(a, b, c, d)| vec![a, b, c, d])
}

fn ipv6_addr() -> impl Strategy<Value = Vec<u8>> + Clone {
    (
        prop::sample::select(vec![[0x20u8, 0x01], [0xfe, 0x80], [0x00, 0x00]]),
        prop::sample::select(vec![0u8, 0x0d, 0xff]),
        0u8..4,
        prop::collection::vec(prop::sample::select(vec![0u8, 1, 0x80, 0xff]), 12),
    )
        .prop_map(|(top, c, d, rest)| {
            let mut addr = vec![top[0], top[1], c, d];
            addr.extend(rest);
            addr
        })
}

fn ops_strategy(
    addr: impl Strategy<Value = Vec<u8>> + Clone,
    len: impl Strategy<Value = u8> + Clone,
) -> impl Strategy<Value = Vec<Op>> {
    let op = prop_oneof![
        45 => (addr.clone(), len.clone(), 0u32..1000).prop_map(|(a, l, nh)| Op::Insert(a, l, nh)),
        25 => (addr.clone(), len).prop_map(|(a, l)| Op::Delete(a, l)),
        30 => addr.prop_map(Op::Lookup),
    ];
    prop::collection::vec(op, 0..=80)
}

// Short IPv4 prefixes fill most of the DIR-24-8 direct table, so keep them rare.
fn ipv4_len() -> impl Strategy<Value = u8> + Clone {
    prop_oneof![
        1 => 0u8..8,
        20 => 8u8..=32,
    ]
}

fn ipv6_len() -> impl Strategy<Value = u8> + Clone {
    prop_oneof![
        1 => 0u8..=16,
        2 => 17u8..=64,
        1 => 65u8..=128,
    ]
}

fn check_against_model(family: Family, ops: &[Op]) -> std::result::Result<(), TestCaseError> {
    let mut tables = tables_for(family);
    let mut model = Model::default();
    let mut probes: Vec<Vec<u8>> = Vec::new();

    for op in ops {
        let probe = match op {
            Op::Insert(network, len, next_hop) => {
                let expected = model.insert(network, *len, *next_hop);
                for t in &mut tables {
                    let got = t.insert(network, *len, *next_hop).unwrap();
                    prop_assert_eq!(got, expected, "{} insert", t.algorithm());
                }
                network
            }
            Op::Delete(network, len) => {
                let expected = model.delete(network, *len);
                for t in &mut tables {
                    let got = t.delete(network, *len).ok();
                    prop_assert_eq!(got, expected, "{} delete", t.algorithm());
                }
                network
            }
            Op::Lookup(addr) => addr,
        };

        let expected = model.lookup(probe);
        for t in &tables {
            prop_assert_eq!(t.lookup(probe).unwrap(), expected, "{} lookup", t.algorithm());
            prop_assert_eq!(t.num_prefixes().unwrap(), model.routes.len());
        }
        probes.push(probe.clone());
    }

    let expected_batch: Vec<_> = probes.iter().map(|a| model.lookup(a)).collect();
    let expected_routes: Vec<_> = model.routes.iter().map(|(&k, &v)| (k, v)).collect();
    for t in &tables {
        t.validate();

        let mut out = vec![None; probes.len()];
        t.lookup_batch(&probes, &mut out).unwrap();
        prop_assert_eq!(&out, &expected_batch, "{} batch", t.algorithm());

        let routes: Vec<_> = t
            .routes()
            .unwrap()
            .into_iter()
            .map(|(p, nh)| ((p.bits(), p.prefix_len()), nh))
            .collect();
        prop_assert_eq!(&routes, &expected_routes, "{} routes", t.algorithm());
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 48,
        max_shrink_iters: 5_000,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_ipv4_matches_model(ops in ops_strategy(ipv4_addr(), ipv4_len())) {
        check_against_model(Family::Ipv4, &ops)?;
    }
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        max_shrink_iters: 50_000,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_ipv6_matches_model(ops in ops_strategy(ipv6_addr(), ipv6_len())) {
        check_against_model(Family::Ipv6, &ops)?;
    }

    #[test]
    fn prop_prefix_parse_display(
        addr in ipv6_addr(),
        len in 0u8..=128,
    ) {
        let prefix = Prefix::new(Family::Ipv6, &addr, len).unwrap();
        let parsed: Prefix = prefix.to_string().parse().unwrap();
        prop_assert_eq!(parsed, prefix);
        prop_assert!(prefix.contains(&addr));
    }
}

/// All orderings of `items`, each built by picking a head and permuting the rest.
fn permutations<T: Clone>(items: &[T]) -> Vec<Vec<T>> {
    if items.len() <= 1 {
        return vec![items.to_vec()];
    }
    let mut all = Vec::new();
    for (i, head) in items.iter().enumerate() {
        let mut rest = items.to_vec();
        rest.remove(i);
        all.extend(permutations(&rest).into_iter().map(|mut tail| {
            tail.insert(0, head.clone());
            tail
        }));
    }
    all
}

/// Every insertion order of a nested set gives the same answers, and every
/// removal order restores the covering prefix at each step.
fn exhaustive_orders(family: Family, prefixes: &[(Vec<u8>, u8)], probes: &[Vec<u8>]) {
    for mut t in tables_for(family) {
        let empty = t.stats().unwrap();
        for perm in permutations(prefixes) {
            let mut model = Model::default();
            for (i, (network, len)) in perm.iter().enumerate() {
                let next_hop = i as NextHop;
                assert_eq!(t.insert(network, *len, next_hop).unwrap(), model.insert(network, *len, next_hop));
            }
            for probe in probes {
                assert_eq!(t.lookup(probe).unwrap(), model.lookup(probe), "{}", t.algorithm());
            }

            for (network, len) in perm.iter().rev() {
                assert_eq!(t.delete(network, *len).ok(), model.delete(network, *len));
                for probe in probes {
                    assert_eq!(t.lookup(probe).unwrap(), model.lookup(probe), "{}", t.algorithm());
                }
            }
            assert_eq!(t.stats().unwrap(), empty, "{}", t.algorithm());
        }
        t.validate();
    }
}

#[test]
fn exhaustive_orders_ipv4() {
    let prefixes = vec![
        (vec![10, 0, 0, 0], 8),
        (vec![10, 1, 0, 0], 16),
        (vec![10, 1, 0, 0], 20),
        (vec![10, 1, 1, 0], 24),
        (vec![10, 1, 1, 128], 25),
        (vec![10, 1, 1, 192], 30),
    ];
    let probes = vec![
        vec![10, 9, 9, 9],
        vec![10, 1, 200, 1],
        vec![10, 1, 2, 1],
        vec![10, 1, 1, 1],
        vec![10, 1, 1, 129],
        vec![10, 1, 1, 193],
        vec![11, 0, 0, 0],
    ];
    exhaustive_orders(Family::Ipv4, &prefixes, &probes);
}

#[test]
fn exhaustive_orders_ipv6() {
    let net = |top: u8, third: u8, fifth: u8| {
        let mut a = vec![0u8; 16];
        a[0] = 0x20;
        a[1] = top;
        a[2] = third;
        a[4] = fifth;
        a
    };
    let prefixes = vec![
        (net(0, 0, 0), 8),
        (net(1, 0, 0), 16),
        (net(1, 0x0d, 0), 24),
        (net(1, 0x0d, 0), 28),
        (net(1, 0x0d, 0x80), 33),
        (net(1, 0x0d, 0x80), 64),
    ];
    let probes = vec![
        net(0x40, 0, 0),
        net(1, 0xff, 0),
        net(1, 0x0d, 0x10),
        net(1, 0x0d, 0x81),
        net(1, 0x0d, 0x80),
        net(2, 0, 0),
    ];
    exhaustive_orders(Family::Ipv6, &prefixes, &probes);
}

#[test]
fn random_tables_agree_ipv4() {
    let mut rng = StdRng::seed_from_u64(0x1f2e_3d4c);
    let mut tables = tables_for(Family::Ipv4);
    let mut model = Model::default();
    let mut inserted = Vec::new();

    for _ in 0..2_000 {
        let network = rng.gen::<u32>().to_be_bytes();
        let len = rng.gen_range(8..=32);
        let next_hop = rng.gen_range(0..1_000_000);
        model.insert(&network, len, next_hop);
        for t in &mut tables {
            t.insert(&network, len, next_hop).unwrap();
        }
        inserted.push((network, len));
    }

    let probe = |rng: &mut StdRng, inserted: &[([u8; 4], u8)]| -> [u8; 4] {
        // Half the probes land inside a stored prefix.
        if rng.gen_bool(0.5) {
            let (network, len) = inserted[rng.gen_range(0..inserted.len())];
            let host = rng.gen::<u32>() & !(u32::MAX.checked_shl(32 - u32::from(len)).unwrap_or(0));
            (u32::from_be_bytes(network) & !host | host).to_be_bytes()
        } else {
            rng.gen::<u32>().to_be_bytes()
        }
    };

    for round in 0..2 {
        let addrs: Vec<[u8; 4]> = (0..5_000).map(|_| probe(&mut rng, &inserted)).collect();
        let expected: Vec<_> = addrs.iter().map(|a| model.lookup(a)).collect();
        for t in &tables {
            let mut out = vec![None; addrs.len()];
            t.lookup_batch(&addrs, &mut out).unwrap();
            assert_eq!(out, expected, "{} round {round}", t.algorithm());
            t.validate();
        }

        for (network, len) in inserted.iter().step_by(2) {
            let expected = model.delete(network, *len);
            for t in &mut tables {
                assert_eq!(t.delete(network, *len).ok(), expected);
            }
        }
        inserted = inserted.into_iter().skip(1).step_by(2).collect();
    }
}

#[test]
fn random_tables_agree_ipv6() {
    let mut rng = StdRng::seed_from_u64(0x6_0016);
    let mut tables = tables_for(Family::Ipv6);
    let mut model = Model::default();

    let tops: [u16; 4] = [0x2001, 0x2400, 0x2a00, 0xfd00];
    let random_addr = |rng: &mut StdRng| -> [u8; 16] {
        let mut bits = rng.gen::<u128>() >> 16;
        bits |= u128::from(tops[rng.gen_range(0..tops.len())]) << 112;
        bits.to_be_bytes()
    };

    for _ in 0..1_500 {
        let network = random_addr(&mut rng);
        let len = rng.gen_range(16..=64);
        let next_hop = rng.gen_range(0..1_000_000);
        model.insert(&network, len, next_hop);
        for t in &mut tables {
            t.insert(&network, len, next_hop).unwrap();
        }
    }

    let mut addrs: Vec<[u8; 16]> = model
        .routes
        .keys()
        .map(|&(bits, len)| (bits | (rng.gen::<u128>() & !mask(len))).to_be_bytes())
        .collect();
    for _ in 0..2_000 {
        addrs.push(random_addr(&mut rng));
    }
    let expected: Vec<_> = addrs.iter().map(|a| model.lookup(a)).collect();
    for t in &tables {
        let mut out = vec![None; addrs.len()];
        t.lookup_batch(&addrs, &mut out).unwrap();
        assert_eq!(out, expected, "{}", t.algorithm());
        t.validate();
    }
}
