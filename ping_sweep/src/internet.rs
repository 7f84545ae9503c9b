use std::net::Ipv4Addr;

pub fn u32_to_ip(n: u32) -> Ipv4Addr {
    Ipv4Addr::from(n)
}

/// Host addresses of `base/prefix`, without the network and broadcast
/// addresses when the subnet has room for them.
pub fn subnet_hosts(base: Ipv4Addr, prefix: u8) -> Result<impl Iterator<Item = Ipv4Addr>, String> {
    if prefix > 32 {
        return Err(format!("Bad prefix length /{}", prefix));
    }
    let mask = if prefix == 0 {
        0
    } else {
        0xFF_FF_FF_FF << (32 - prefix)
    };
    let network = u32::from(base) & mask;
    let broadcast = network | !mask;
    let (first, last) = if prefix >= 31 {
        (network, broadcast)
    } else {
        (network + 1, broadcast - 1)
    };
    Ok((first..=last).map(u32_to_ip))
}

pub fn parse_subnet(s: &str) -> Result<(Ipv4Addr, u8), String> {
    let (addr, prefix) = match s.split_once('/') {
        Some((addr, prefix)) => (
            addr,
            prefix
                .parse::<u8>()
                .map_err(|e| format!("Bad prefix length {:?}: {}", prefix, e))?,
        ),
        None => (s, 32),
    };
    let addr = addr
        .parse::<Ipv4Addr>()
        .map_err(|e| format!("Bad subnet address {:?}: {}", addr, e))?;
    Ok((addr, prefix))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn class_c_subnet() {
        let hosts: Vec<_> = subnet_hosts(Ipv4Addr::new(192, 168, 1, 77), 24)
            .unwrap()
            .collect();
        assert_eq!(hosts.len(), 254);
        assert_eq!(hosts[0], Ipv4Addr::new(192, 168, 1, 1));
        assert_eq!(hosts[253], Ipv4Addr::new(192, 168, 1, 254));
    }

    #[test]
    fn tiny_subnets() {
        let single: Vec<_> = subnet_hosts(Ipv4Addr::new(10, 0, 0, 5), 32)
            .unwrap()
            .collect();
        assert_eq!(single, vec![Ipv4Addr::new(10, 0, 0, 5)]);
        assert_eq!(subnet_hosts(Ipv4Addr::new(10, 0, 0, 4), 31).unwrap().count(), 2);
        assert_eq!(subnet_hosts(Ipv4Addr::new(10, 0, 0, 4), 30).unwrap().count(), 2);
        assert!(subnet_hosts(Ipv4Addr::new(10, 0, 0, 4), 33).is_err());
    }

    #[test]
    fn parse() {
        assert_eq!(
            parse_subnet("192.168.1.0/24").unwrap(),
            (Ipv4Addr::new(192, 168, 1, 0), 24)
        );
        assert_eq!(
            parse_subnet("8.8.8.8").unwrap(),
            (Ipv4Addr::new(8, 8, 8, 8), 32)
        );
        assert!(parse_subnet("192.168.1.0/abc").is_err());
        assert!(parse_subnet("example.com/24").is_err());
    }
}
