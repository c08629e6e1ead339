//! Single property modifiers (Sprm) and their operands (Prl)
use ctxutils::io::ByteCursor;
use std::fmt::Debug;
use std::io;

/// `sprmTDefTable`
pub const SPRM_T_DEF_TABLE: u16 = 0xD608;
/// `sprmPChgTabs`
pub const SPRM_P_CHG_TABS: u16 = 0xC615;
/// `sprmPHugePapx`
pub const SPRM_P_HUGE_PAPX: u16 = 0x6646;
/// `sprmPTableProps`
pub const SPRM_P_TABLE_PROPS: u16 = 0x646B;
/// Largest grpprl size allowed in a Prc or in a Data stream redirection
pub const MAX_GRPPRL_SIZE: i16 = 0x3FA2;

/// A property modifier opcode
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Sprm(pub u16);

impl Sprm {
    /// The operation code (unique within each `sgc`)
    pub fn ispmd(&self) -> u16 {
        self.0 & 0x01FF
    }

    /// Special handling flag
    pub fn f_spec(&self) -> bool {
        (self.0 >> 9) & 1 != 0
    }

    /// The kind of property affected (1 paragraph, 2 character, 3 picture, 4 section, 5 table)
    pub fn sgc(&self) -> u8 {
        ((self.0 >> 10) & 0x7) as u8
    }

    /// The operand size class
    pub fn spra(&self) -> u8 {
        (self.0 >> 13) as u8
    }

    /// The size of the operand for fixed size classes, [None] for variable ones
    pub fn fixed_operand_size(&self) -> Option<usize> {
        match self.spra() {
            0 | 1 => Some(1),
            2 | 4 | 5 => Some(2),
            3 => Some(4),
            7 => Some(3),
            _ => None,
        }
    }
}

impl Debug for Sprm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sprm")
            .field("sprm", &format_args!("{:04x}", self.0))
            .field("ispmd", &self.ispmd())
            .field("fSpec", &self.f_spec())
            .field("sgc", &self.sgc())
            .field("spra", &self.spra())
            .finish()
    }
}

/// A property modifier together with its operand
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prl {
    /// The opcode
    pub sprm: Sprm,
    /// The raw operand, including any leading size field
    pub operand: Vec<u8>,
}

impl Prl {
    /// Reads one Prl
    ///
    /// A Prl which does not fit the cursor is an error
    pub fn parse(c: &mut ByteCursor) -> Result<Self, io::Error> {
        let start = c.position();
        let sprm = Sprm(c.rdu16le()?);
        let size = match sprm.fixed_operand_size() {
            Some(size) => size,
            None => variable_operand_size(sprm, c)?,
        };
        let operand = c
            .take(size)
            .map_err(|_| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!(
                        "Truncated Prl {:04x} at offset {}: operand of {} bytes exceeds the {} available",
                        sprm.0,
                        start,
                        size,
                        c.remaining()
                    ),
                )
            })?
            .to_vec();
        Ok(Self { sprm, operand })
    }

    /// The operand as a little endian `u32`, if it is 4 bytes long
    pub fn operand_u32(&self) -> Option<u32> {
        let buf: [u8; 4] = self.operand.as_slice().try_into().ok()?;
        Some(u32::from_le_bytes(buf))
    }
}

fn variable_operand_size(sprm: Sprm, c: &ByteCursor) -> Result<usize, io::Error> {
    let mut peek = c.clone();
    match sprm.0 {
        SPRM_T_DEF_TABLE => {
            let cb = peek.rdu16le()?;
            if cb == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "Invalid sprmTDefTable operand size 0",
                ));
            }
            Ok(usize::from(cb) + 1)
        }
        SPRM_P_CHG_TABS => {
            let cb = peek.rdu8()?;
            match cb {
                0 | 1 => Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("Invalid sprmPChgTabs operand size {}", cb),
                )),
                255 => {
                    let c_del = usize::from(peek.rdu8()?);
                    peek.skip(4 * c_del)?;
                    let c_add = usize::from(peek.rdu8()?);
                    Ok(1 + (1 + 4 * c_del) + (1 + 3 * c_add))
                }
                _ => Ok(usize::from(cb) + 1),
            }
        }
        _ => Ok(usize::from(peek.rdu8()?) + 1),
    }
}

/// Decodes a whole group of Prls
pub fn parse_grpprl(data: &[u8]) -> Result<Vec<Prl>, io::Error> {
    let mut c = ByteCursor::new(data);
    let mut ret = Vec::new();
    while c.remaining() > 0 {
        ret.push(Prl::parse(&mut c)?);
    }
    Ok(ret)
}

/// Returns the first Prl with the given opcode
pub fn find_prl(grpprl: &[Prl], sprm: u16) -> Option<&Prl> {
    grpprl.iter().find(|prl| prl.sprm.0 == sprm)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn sprm_fields() {
        let s = Sprm(0x6646);
        assert_eq!(s.ispmd(), 0x46);
        assert!(!s.f_spec());
        assert_eq!(s.sgc(), 1);
        assert_eq!(s.spra(), 3);
        let s = Sprm(0x0855);
        assert!(!s.f_spec());
        assert_eq!(s.sgc(), 2);
        let s = Sprm(0xD608);
        assert!(s.f_spec());
        assert_eq!(s.sgc(), 5);
        assert_eq!(s.spra(), 6);
    }

    #[test]
    fn fixed_sizes() -> Result<(), io::Error> {
        for (spra, size) in [(0u16, 1usize), (1, 1), (2, 2), (3, 4), (4, 2), (5, 2), (7, 3)] {
            let op = (spra << 13) | 0x0801;
            let mut data = op.to_le_bytes().to_vec();
            data.extend(std::iter::repeat(0xaa).take(size));
            data.push(0x55);
            let mut c = ByteCursor::new(&data);
            let prl = Prl::parse(&mut c)?;
            assert_eq!(prl.operand.len(), size, "spra {}", spra);
            assert_eq!(c.remaining(), 1);
        }
        Ok(())
    }

    #[test]
    fn variable_sizes() -> Result<(), io::Error> {
        // generic: leading byte k, k + 1 bytes in total
        let data = [0x2a, 0xc6, 3, 1, 2, 3, 0xff];
        let mut c = ByteCursor::new(&data);
        let prl = Prl::parse(&mut c)?;
        assert_eq!(prl.operand, vec![3, 1, 2, 3]);
        assert_eq!(c.remaining(), 1);

        // sprmTDefTable: u16 cb, cb + 1 bytes in total
        let mut data = vec![0x08, 0xd6, 4, 0, 9, 9, 9];
        data.push(0xee);
        let mut c = ByteCursor::new(&data);
        let prl = Prl::parse(&mut c)?;
        assert_eq!(prl.operand, vec![4, 0, 9, 9, 9]);
        assert_eq!(c.remaining(), 1);

        // sprmPChgTabs with an explicit size
        let data = [0x15, 0xc6, 2, 7, 7];
        let prl = Prl::parse(&mut ByteCursor::new(&data))?;
        assert_eq!(prl.operand.len(), 3);

        // sprmPChgTabs with cb 255: 2 deleted tabs, 1 added tab
        let mut data = vec![0x15, 0xc6, 255, 2];
        data.extend([0u8; 8]);
        data.push(1);
        data.extend([0u8; 3]);
        let mut c = ByteCursor::new(&data);
        let prl = Prl::parse(&mut c)?;
        assert_eq!(prl.operand.len(), 1 + (1 + 4 * 2) + (1 + 3));
        assert_eq!(c.remaining(), 0);
        Ok(())
    }

    #[test]
    fn bad_prls() {
        assert!(Prl::parse(&mut ByteCursor::new(&[0x15, 0xc6, 1, 0])).is_err());
        assert!(Prl::parse(&mut ByteCursor::new(&[0x08, 0xd6, 0, 0])).is_err());
        let e = Prl::parse(&mut ByteCursor::new(&[0x03, 0x6a, 1, 2])).unwrap_err();
        assert_eq!(e.kind(), io::ErrorKind::InvalidData);
        assert!(parse_grpprl(&[0x3c, 0x08, 1, 0x3c]).is_err());
    }

    #[test]
    fn grpprls() -> Result<(), io::Error> {
        let grpprl = parse_grpprl(&[0x3c, 0x08, 0x01, 0x03, 0x6a, 1, 0, 0, 0, 0x55, 0x08, 0x80])?;
        assert_eq!(grpprl.len(), 3);
        assert_eq!(find_prl(&grpprl, 0x083c).unwrap().operand, vec![1]);
        assert_eq!(find_prl(&grpprl, 0x6a03).unwrap().operand_u32(), Some(1));
        assert_eq!(find_prl(&grpprl, 0x0855).unwrap().operand, vec![0x80]);
        assert!(find_prl(&grpprl, 0x0802).is_none());
        assert!(parse_grpprl(&[])?.is_empty());
        Ok(())
    }
}
