use doctext::clx::Clx;
use doctext::{Config, Doc, DocError, DocExtractor, TextExtractor};
use std::io::{Cursor, Write};

const TEXT_START: u32 = 0x400;
const CHPX_PN: u32 = 4;
const PAPX_PN: u32 = 5;
const WD_SIZE: usize = 0xC00;

enum Piece {
    Compressed(Vec<u8>),
    Unicode(&'static str),
}

impl Piece {
    fn chars(&self) -> u32 {
        match self {
            Piece::Compressed(v) => v.len() as u32,
            Piece::Unicode(s) => s.encode_utf16().count() as u32,
        }
    }

    fn bytes(&self) -> Vec<u8> {
        match self {
            Piece::Compressed(v) => v.clone(),
            Piece::Unicode(s) => s.encode_utf16().flat_map(|u| u.to_le_bytes()).collect(),
        }
    }
}

struct Fixture {
    pieces: Vec<Piece>,
    ccp_text: Option<i32>,
    chpx_page: Option<Vec<u8>>,
    papx_page: Option<Vec<u8>>,
    data: Option<Vec<u8>>,
    which_table: bool,
    table_stream: &'static str,
    encrypted: bool,
    extra: Vec<(&'static str, Vec<u8>)>,
    version: cfb::Version,
}

impl Fixture {
    fn new(pieces: Vec<Piece>) -> Self {
        Self {
            pieces,
            ccp_text: None,
            chpx_page: None,
            papx_page: None,
            data: None,
            which_table: true,
            table_stream: "1Table",
            encrypted: false,
            extra: Vec::new(),
            version: cfb::Version::V3,
        }
    }

    fn text(text: &'static str) -> Self {
        Self::new(vec![Piece::Unicode(text)])
    }

    fn piece_offsets(&self) -> Vec<u32> {
        let mut cur = TEXT_START;
        self.pieces
            .iter()
            .map(|p| {
                let ret = cur;
                cur += p.bytes().len() as u32;
                cur += cur & 1;
                ret
            })
            .collect()
    }

    fn word_document(&self) -> Vec<u8> {
        let mut wd = vec![0u8; WD_SIZE];
        wd[0..2].copy_from_slice(&0xa5ecu16.to_le_bytes());
        wd[2..4].copy_from_slice(&0xc1u16.to_le_bytes());
        wd[10] = u8::from(self.which_table) << 6;
        wd[11] = u8::from(self.encrypted);
        let total: u32 = self.pieces.iter().map(|p| p.chars()).sum();
        let ccp = self.ccp_text.unwrap_or(total as i32);
        wd[76..80].copy_from_slice(&ccp.to_le_bytes());
        let clx_len = self.clx().len() as u32;
        let mut fc = clx_len;
        if self.chpx_page.is_some() {
            wd[250..254].copy_from_slice(&fc.to_le_bytes());
            wd[254..258].copy_from_slice(&12u32.to_le_bytes());
            fc += 12;
        }
        if self.papx_page.is_some() {
            wd[258..262].copy_from_slice(&fc.to_le_bytes());
            wd[262..266].copy_from_slice(&12u32.to_le_bytes());
        }
        wd[418..422].copy_from_slice(&0u32.to_le_bytes());
        wd[422..426].copy_from_slice(&clx_len.to_le_bytes());
        for (piece, offset) in self.pieces.iter().zip(self.piece_offsets()) {
            let bytes = piece.bytes();
            let offset = offset as usize;
            wd[offset..offset + bytes.len()].copy_from_slice(&bytes);
        }
        if let Some(page) = &self.chpx_page {
            let off = CHPX_PN as usize * 512;
            wd[off..off + 512].copy_from_slice(page);
        }
        if let Some(page) = &self.papx_page {
            let off = PAPX_PN as usize * 512;
            wd[off..off + 512].copy_from_slice(page);
        }
        wd
    }

    fn clx(&self) -> Vec<u8> {
        let mut plc: Vec<u8> = Vec::new();
        let mut cp = 0u32;
        plc.extend(cp.to_le_bytes());
        for p in self.pieces.iter() {
            cp += p.chars();
            plc.extend(cp.to_le_bytes());
        }
        for (p, offset) in self.pieces.iter().zip(self.piece_offsets()) {
            let fc = match p {
                Piece::Compressed(_) => (offset * 2) | 0x4000_0000,
                Piece::Unicode(_) => offset,
            };
            plc.extend([0, 0]);
            plc.extend(fc.to_le_bytes());
            plc.extend([0, 0]);
        }
        let mut clx = vec![2u8];
        clx.extend((plc.len() as u32).to_le_bytes());
        clx.extend(plc);
        clx
    }

    fn table(&self) -> Vec<u8> {
        let mut table = self.clx();
        if self.chpx_page.is_some() {
            for v in [TEXT_START, 0x800, CHPX_PN] {
                table.extend(v.to_le_bytes());
            }
        }
        if self.papx_page.is_some() {
            for v in [TEXT_START, 0x800, PAPX_PN] {
                table.extend(v.to_le_bytes());
            }
        }
        table
    }

    fn build(&self) -> Vec<u8> {
        let mut streams: Vec<(&str, Vec<u8>)> = vec![
            ("/WordDocument", self.word_document()),
            (self.table_stream, self.table()),
        ];
        if let Some(data) = &self.data {
            streams.push(("/Data", data.clone()));
        }
        streams.extend(self.extra.iter().cloned());
        container(self.version, &streams)
    }
}

fn container(version: cfb::Version, streams: &[(&str, Vec<u8>)]) -> Vec<u8> {
    let mut comp =
        cfb::CompoundFile::create_with_version(version, Cursor::new(Vec::new())).unwrap();
    for (path, data) in streams {
        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{}", path)
        };
        if let Some((storage, _)) = path.rsplit_once('/') {
            if !storage.is_empty() {
                comp.create_storage_all(storage).unwrap();
            }
        }
        let mut stream = comp.create_stream(&path).unwrap();
        stream.write_all(data).unwrap();
    }
    comp.flush().unwrap();
    comp.into_inner().into_inner()
}

/// A ChpxFkp page; runs without properties are `None`
fn chpx_page(rgfc: &[u32], grpprls: &[Option<&[u8]>]) -> Vec<u8> {
    let mut page = vec![0u8; 512];
    let crun = grpprls.len();
    for (i, fc) in rgfc.iter().enumerate() {
        page[i * 4..i * 4 + 4].copy_from_slice(&fc.to_le_bytes());
    }
    let mut pos = 0x100usize;
    for (i, grpprl) in grpprls.iter().enumerate() {
        if let Some(grpprl) = grpprl {
            page[(crun + 1) * 4 + i] = (pos / 2) as u8;
            page[pos] = grpprl.len() as u8;
            page[pos + 1..pos + 1 + grpprl.len()].copy_from_slice(grpprl);
            pos += grpprl.len() + 1;
            pos += pos & 1;
        }
    }
    page[511] = crun as u8;
    page
}

/// A PapxFkp page; `payloads` are istd followed by the Prls
fn papx_page(rgfc: &[u32], payloads: &[Option<&[u8]>]) -> Vec<u8> {
    let mut page = vec![0u8; 512];
    let crun = payloads.len();
    for (i, fc) in rgfc.iter().enumerate() {
        page[i * 4..i * 4 + 4].copy_from_slice(&fc.to_le_bytes());
    }
    let mut pos = 0x100usize;
    for (i, payload) in payloads.iter().enumerate() {
        if let Some(payload) = payload {
            page[(crun + 1) * 4 + i * 13] = (pos / 2) as u8;
            if payload.len() % 2 == 1 {
                page[pos] = ((payload.len() + 1) / 2) as u8;
                pos += 1;
            } else {
                page[pos] = 0;
                page[pos + 1] = (payload.len() / 2) as u8;
                pos += 2;
            }
            page[pos..pos + payload.len()].copy_from_slice(payload);
            pos += payload.len();
            pos += pos & 1;
        }
    }
    page[511] = crun as u8;
    page
}

fn text_of(data: Vec<u8>) -> Result<String, DocError> {
    let doc = Doc::new(Cursor::new(data))?;
    assert!(doc.is_valid_word_doc());
    doc.get_text()
}

#[test]
fn hello() -> Result<(), DocError> {
    let data = Fixture::text("Hi").build();
    let doc = Doc::new(Cursor::new(data))?;
    assert!(doc.is_valid_word_doc());
    assert_eq!(doc.get_text()?, "Hi");
    // cached model
    assert_eq!(doc.get_text()?, "Hi");
    assert_eq!(doc.fib()?.ccpText, 2);
    assert_eq!(doc.ole().version().0, 3);
    doc.close();
    Ok(())
}

#[test]
fn hello_v4() -> Result<(), DocError> {
    let mut fixture = Fixture::text("Hello\r");
    fixture.version = cfb::Version::V4;
    assert_eq!(text_of(fixture.build())?, "Hello\r");
    Ok(())
}

#[test]
fn compressed_text() -> Result<(), DocError> {
    let fixture = Fixture::new(vec![Piece::Compressed(b"Caf\xe9 \x93q\x94\x85\x80".to_vec())]);
    assert_eq!(text_of(fixture.build())?, "Café \u{201c}q\u{201d}\u{2026}\u{80}");
    Ok(())
}

#[test]
fn mixed_pieces() -> Result<(), DocError> {
    let fixture = Fixture::new(vec![
        Piece::Compressed(b"plain ".to_vec()),
        Piece::Unicode("\u{3b1}\u{3b2} "),
        Piece::Compressed(b"end\r".to_vec()),
    ]);
    assert_eq!(text_of(fixture.build())?, "plain \u{3b1}\u{3b2} end\r");
    Ok(())
}

#[test]
fn fields() -> Result<(), DocError> {
    let fixture = Fixture::text("A\u{13} HYPERLINK \"http://x\" \u{14}link\u{15}B\u{7}\r");
    assert_eq!(text_of(fixture.build())?, "AlinkB\r");
    Ok(())
}

#[test]
fn ccp_text_limit() -> Result<(), DocError> {
    let mut fixture = Fixture::text("Hello world");
    fixture.ccp_text = Some(5);
    assert_eq!(text_of(fixture.build())?, "Hello");

    let mut fixture = Fixture::text("Hello world");
    fixture.ccp_text = Some(-1);
    let e = text_of(fixture.build()).unwrap_err();
    assert!(matches!(e, DocError::InvalidData(_)), "{:?}", e);
    Ok(())
}

#[test]
fn hidden_text() -> Result<(), DocError> {
    let mut fixture = Fixture::new(vec![Piece::Compressed(b"visible hidden".to_vec())]);
    let vanish: &[u8] = &[0x3c, 0x08, 0x01];
    fixture.chpx_page = Some(chpx_page(
        &[TEXT_START, TEXT_START + 8, TEXT_START + 14],
        &[None, Some(vanish)],
    ));
    assert_eq!(text_of(fixture.build())?, "visible ");

    // the operand is not consulted
    let vanish_off: &[u8] = &[0x3c, 0x08, 0x00];
    fixture.chpx_page = Some(chpx_page(
        &[TEXT_START, TEXT_START + 8, TEXT_START + 14],
        &[None, Some(vanish_off)],
    ));
    assert_eq!(text_of(fixture.build())?, "visible ");

    // properties without a visibility class
    let bold: &[u8] = &[0x35, 0x08, 0x01];
    fixture.chpx_page = Some(chpx_page(
        &[TEXT_START, TEXT_START + 8, TEXT_START + 14],
        &[None, Some(bold)],
    ));
    assert_eq!(text_of(fixture.build())?, "visible hidden");
    Ok(())
}

#[test]
fn hidden_unicode_text() -> Result<(), DocError> {
    let mut fixture = Fixture::text("ab<pic>cd");
    let special: &[u8] = &[0x55, 0x08, 0x01];
    fixture.chpx_page = Some(chpx_page(
        &[TEXT_START, TEXT_START + 4, TEXT_START + 14, TEXT_START + 18],
        &[None, Some(special), None],
    ));
    assert_eq!(text_of(fixture.build())?, "abcd");
    Ok(())
}

#[test]
fn data_stream_redirection() -> Result<(), DocError> {
    let mut fixture = Fixture::new(vec![Piece::Compressed(b"cell\rnext\r".to_vec())]);
    let huge: &[u8] = &[0, 0, 0x46, 0x66, 4, 0, 0, 0];
    fixture.papx_page = Some(papx_page(
        &[TEXT_START, TEXT_START + 5, TEXT_START + 10],
        &[Some(huge), None],
    ));
    let mut data = vec![0xffu8; 4];
    data.extend([3, 0, 0x4b, 0x24, 1]);
    fixture.data = Some(data);
    assert_eq!(text_of(fixture.build())?, "cellnext\r");

    fixture.data = None;
    let e = text_of(fixture.build()).unwrap_err();
    assert!(matches!(&e, DocError::MissingStream(s) if s == "Data"), "{:?}", e);
    assert!(e.is_data_error());
    Ok(())
}

#[test]
fn paragraph_newlines() -> Result<(), DocError> {
    let data = Fixture::text("one\rtwo\r").build();
    let config = Config {
        paragraph_newlines: true,
        ..Config::default()
    };
    let doc = Doc::with_config(Cursor::new(data), &config)?;
    assert_eq!(doc.get_text()?, "one\ntwo\n");
    Ok(())
}

#[test]
fn table_streams() -> Result<(), DocError> {
    let mut fixture = Fixture::text("zero");
    fixture.which_table = false;
    fixture.table_stream = "0Table";
    assert_eq!(text_of(fixture.build())?, "zero");

    // selector says 1Table but only 0Table exists
    fixture.which_table = true;
    assert_eq!(text_of(fixture.build())?, "zero");

    fixture.table_stream = "Other";
    let e = text_of(fixture.build()).unwrap_err();
    assert!(matches!(&e, DocError::MissingStream(s) if s == "1Table"), "{:?}", e);

    // the selected 1Table wins over a broken 0Table
    let mut fixture = Fixture::text("Hi");
    fixture.extra = vec![("/0Table", vec![7u8; 64])];
    assert_eq!(text_of(fixture.build())?, "Hi");
    Ok(())
}

#[test]
fn encrypted() -> Result<(), DocError> {
    let mut fixture = Fixture::text("secret");
    fixture.encrypted = true;
    let e = text_of(fixture.build()).unwrap_err();
    assert!(matches!(e, DocError::Encrypted));
    Ok(())
}

#[test]
fn not_word_documents() -> Result<(), DocError> {
    let data = container(cfb::Version::V3, &[("/Foo", vec![1, 2, 3])]);
    let doc = Doc::new(Cursor::new(data))?;
    assert!(!doc.is_valid_word_doc());
    assert!(matches!(doc.get_text(), Err(DocError::NotWordDocument)));

    let data = container(cfb::Version::V3, &[("/WordDocument", vec![0u8; 600])]);
    let doc = Doc::new(Cursor::new(data))?;
    assert!(!doc.is_valid_word_doc());
    assert!(matches!(doc.get_text(), Err(DocError::NotWordDocument)));

    // only an embedded document
    let embedded = Fixture::text("inner").word_document();
    let data = container(
        cfb::Version::V3,
        &[("/ObjectPool/_1234/WordDocument", embedded)],
    );
    let doc = Doc::new(Cursor::new(data))?;
    assert!(!doc.is_valid_word_doc());

    let e = Doc::new(Cursor::new(b"plain text file".to_vec())).err().unwrap();
    assert!(e.is_data_error());
    Ok(())
}

#[test]
fn embedded_documents_are_skipped() -> Result<(), DocError> {
    let mut fixture = Fixture::text("outer");
    fixture.extra = vec![(
        "/ObjectPool/_1234/WordDocument",
        Fixture::text("inner").word_document(),
    )];
    assert_eq!(text_of(fixture.build())?, "outer");
    Ok(())
}

#[test]
fn stream_size_limit() -> Result<(), DocError> {
    let config = Config {
        max_stream_size: 4096,
        ..Config::default()
    };
    // an unused Data stream is never read
    let mut fixture = Fixture::text("limited");
    fixture.data = Some(vec![0u8; 5000]);
    let doc = Doc::with_config(Cursor::new(fixture.build()), &config)?;
    assert_eq!(doc.get_text()?, "limited");

    // a redirected property needs it
    let mut fixture = Fixture::new(vec![Piece::Compressed(b"cell\rnext\r".to_vec())]);
    let huge: &[u8] = &[0, 0, 0x46, 0x66, 4, 0, 0, 0];
    fixture.papx_page = Some(papx_page(
        &[TEXT_START, TEXT_START + 5, TEXT_START + 10],
        &[Some(huge), None],
    ));
    let mut data = vec![0xffu8; 4];
    data.extend([3, 0, 0x4b, 0x24, 1]);
    data.resize(5000, 0);
    fixture.data = Some(data);
    let doc = Doc::with_config(Cursor::new(fixture.build()), &config)?;
    let e = doc.get_text().unwrap_err();
    assert!(matches!(e, DocError::InvalidData(_)), "{:?}", e);

    let doc = Doc::new(Cursor::new(fixture.build()))?;
    assert_eq!(doc.get_text()?, "cellnext\r");
    Ok(())
}

#[test]
fn piece_table_covers_ccp_text() -> Result<(), DocError> {
    let fixture = Fixture::new(vec![
        Piece::Compressed(b"one ".to_vec()),
        Piece::Unicode("two \u{3b3} "),
        Piece::Compressed(b"three\r".to_vec()),
    ]);
    let doc = Doc::new(Cursor::new(fixture.build()))?;
    let ccp_text = doc.fib()?.ccpText;
    let clx = Clx::parse(&fixture.clx())?;
    let pieces: Vec<u32> = clx.Pcdt.pieces().map(|p| p.len()).collect();
    assert_eq!(pieces, vec![4, 6, 6]);
    assert_eq!(pieces.iter().sum::<u32>(), ccp_text);
    assert_eq!(clx.Pcdt.total_cp(), ccp_text);
    let text = doc.get_text()?;
    assert_eq!(text, "one two \u{3b3} three\r");
    assert_eq!(text.encode_utf16().count() as u32, ccp_text);
    Ok(())
}

#[test]
fn files() -> Result<(), DocError> {
    let mut f = tempfile::NamedTempFile::new()?;
    f.write_all(&Fixture::text("from a file\r").build())?;
    f.flush()?;
    let doc = Doc::open(f.path())?;
    assert_eq!(doc.get_text()?, "from a file\r");
    doc.close();

    let extractor = DocExtractor::default();
    assert_eq!(extractor.extract_text(f.path())?, "from a file\r");

    let dir = tempfile::tempdir()?;
    let e = extractor
        .extract_text(&dir.path().join("missing.doc"))
        .unwrap_err();
    assert!(matches!(e, DocError::Io(_)));
    assert!(!e.is_data_error());
    Ok(())
}
