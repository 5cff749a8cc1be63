use dmg::compression::compress_zlib;
use dmg::types::{ChunkType, CHECKSUM_TYPE_CRC32};
use dmg::utils::checksum::crc32;

const SECTOR: usize = 512;

/// Chunk as it will be written to the block table
struct ChunkSpec {
    kind: u32,
    sectors: u64,
    payload: Vec<u8>,
    /// Decoded sector contents, `None` when the reader must reject the chunk
    decoded: Option<Vec<u8>>,
}

/// Builds UDIF images in memory
///
/// The data fork holds every chunk payload back to back, followed by the
/// property list and the trailer. Each block table is returned alongside the
/// image so a static parser can hand them back.
pub struct ImageBuilder {
    blocks: Vec<Vec<ChunkSpec>>,
    compress_plist: bool,
    corrupt_crc: bool,
    checksum_type: u32,
    gap_sectors: u64,
}

/// Output of [`ImageBuilder::build`]
pub struct BuiltImage {
    pub bytes: Vec<u8>,
    pub plist: Vec<u8>,
    pub tables: Vec<Vec<u8>>,
    /// Expected contents of every sector, zeros for rejected chunks
    pub sectors: Vec<u8>,
    pub sector_count: u64,
}

impl ImageBuilder {
    pub fn new() -> Self {
        Self {
            blocks: vec![Vec::new()],
            compress_plist: false,
            corrupt_crc: false,
            checksum_type: CHECKSUM_TYPE_CRC32,
            gap_sectors: 0,
        }
    }

    fn push(&mut self, spec: ChunkSpec) -> &mut Self {
        self.blocks.last_mut().unwrap().push(spec);
        self
    }

    /// Start a new block table
    pub fn new_block(&mut self) -> &mut Self {
        self.blocks.push(Vec::new());
        self
    }

    pub fn raw(&mut self, data: &[u8]) -> &mut Self {
        assert_eq!(data.len() % SECTOR, 0);
        self.push(ChunkSpec {
            kind: ChunkType::Raw.to_raw(),
            sectors: (data.len() / SECTOR) as u64,
            payload: data.to_vec(),
            decoded: Some(data.to_vec()),
        })
    }

    pub fn zero(&mut self, sectors: u64) -> &mut Self {
        self.push(ChunkSpec {
            kind: ChunkType::Zero.to_raw(),
            sectors,
            payload: Vec::new(),
            decoded: Some(vec![0u8; sectors as usize * SECTOR]),
        })
    }

    pub fn ignore(&mut self, sectors: u64) -> &mut Self {
        self.push(ChunkSpec {
            kind: ChunkType::Ignore.to_raw(),
            sectors,
            payload: Vec::new(),
            decoded: Some(vec![0u8; sectors as usize * SECTOR]),
        })
    }

    pub fn zlib(&mut self, data: &[u8]) -> &mut Self {
        assert_eq!(data.len() % SECTOR, 0);
        let mut packed = vec![0u8; data.len() + 1024];
        let len = compress_zlib(&mut packed, data).unwrap();
        packed.truncate(len);
        self.push(ChunkSpec {
            kind: ChunkType::Zlib.to_raw(),
            sectors: (data.len() / SECTOR) as u64,
            payload: packed,
            decoded: Some(data.to_vec()),
        })
    }

    #[cfg(feature = "bzip2")]
    pub fn bzip2(&mut self, data: &[u8]) -> &mut Self {
        use bzip2::{Action, Compress, Compression};

        assert_eq!(data.len() % SECTOR, 0);
        let mut stream = Compress::new(Compression::best(), 0);
        let mut packed = vec![0u8; data.len() + 1024];
        stream.compress(data, &mut packed, Action::Finish).unwrap();
        packed.truncate(stream.total_out() as usize);
        self.push(ChunkSpec {
            kind: ChunkType::Bzip2.to_raw(),
            sectors: (data.len() / SECTOR) as u64,
            payload: packed,
            decoded: Some(data.to_vec()),
        })
    }

    /// ADC chunk made of literal runs only
    pub fn adc(&mut self, data: &[u8]) -> &mut Self {
        assert_eq!(data.len() % SECTOR, 0);
        let mut packed = Vec::new();
        for run in data.chunks(128) {
            packed.push(0x80 | (run.len() - 1) as u8);
            packed.extend_from_slice(run);
        }
        self.push(ChunkSpec {
            kind: ChunkType::Adc.to_raw(),
            sectors: (data.len() / SECTOR) as u64,
            payload: packed,
            decoded: Some(data.to_vec()),
        })
    }

    /// Chunk of an arbitrary type the reader is expected to reject
    pub fn opaque(&mut self, kind: u32, sectors: u64, payload: &[u8]) -> &mut Self {
        self.push(ChunkSpec {
            kind,
            sectors,
            payload: payload.to_vec(),
            decoded: None,
        })
    }

    /// Leave sectors at the end of the current block without a chunk
    pub fn gap(&mut self, sectors: u64) -> &mut Self {
        self.gap_sectors = sectors;
        self
    }

    pub fn compress_plist(&mut self) -> &mut Self {
        self.compress_plist = true;
        self
    }

    pub fn corrupt_crc(&mut self) -> &mut Self {
        self.corrupt_crc = true;
        self
    }

    pub fn checksum_type(&mut self, kind: u32) -> &mut Self {
        self.checksum_type = kind;
        self
    }

    pub fn build(&self) -> BuiltImage {
        let mut data_fork = Vec::new();
        let mut tables = Vec::new();
        let mut sectors = Vec::new();
        let mut next_sector = 0u64;

        let block_count = self.blocks.len();
        for (index, chunks) in self.blocks.iter().enumerate() {
            let block_start = next_sector;
            let mut entries = Vec::new();
            let mut relative = 0u64;

            for chunk in chunks {
                entries.push((
                    chunk.kind,
                    relative,
                    chunk.sectors,
                    data_fork.len() as u64,
                    chunk.payload.len() as u64,
                ));
                data_fork.extend_from_slice(&chunk.payload);
                match &chunk.decoded {
                    Some(decoded) => sectors.extend_from_slice(decoded),
                    None => sectors.resize(sectors.len() + chunk.sectors as usize * SECTOR, 0),
                }
                relative += chunk.sectors;
            }

            // Gap belongs to the last block only
            if index + 1 == block_count {
                relative += self.gap_sectors;
                sectors.resize(sectors.len() + self.gap_sectors as usize * SECTOR, 0);
            }
            entries.push((ChunkType::Last.to_raw(), relative, 0, data_fork.len() as u64, 0));

            tables.push(block_table(block_start, relative, &entries));
            next_sector += relative;
        }

        let sector_count = next_sector;
        let mut plist = format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?><plist version=\"1.0\"><!-- {} blkx --></plist>",
            tables.len()
        )
        .into_bytes();
        let plain_plist = plist.clone();
        if self.compress_plist {
            let mut packed = vec![0u8; plist.len() + 256];
            let len = compress_zlib(&mut packed, &plist).unwrap();
            packed.truncate(len);
            plist = packed;
        }

        let mut crc = crc32(&data_fork);
        if self.corrupt_crc {
            crc ^= 1;
        }

        let mut bytes = data_fork.clone();
        let xml_offset = bytes.len() as u64;
        bytes.extend_from_slice(&plist);
        bytes.extend_from_slice(&trailer(
            data_fork.len() as u64,
            xml_offset,
            plist.len() as u64,
            sector_count,
            self.checksum_type,
            crc,
        ));

        BuiltImage {
            bytes,
            plist: plain_plist,
            tables,
            sectors,
            sector_count,
        }
    }
}

fn block_table(sector_number: u64, sector_count: u64, entries: &[(u32, u64, u64, u64, u64)]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"mish");
    out.extend_from_slice(&1u32.to_be_bytes());
    out.extend_from_slice(&sector_number.to_be_bytes());
    out.extend_from_slice(&sector_count.to_be_bytes());
    out.extend_from_slice(&0u64.to_be_bytes()); // data offset
    out.extend_from_slice(&0u32.to_be_bytes()); // buffers needed
    out.extend_from_slice(&0u32.to_be_bytes()); // block descriptors
    out.extend_from_slice(&[0u8; 24]);
    out.extend_from_slice(&[0u8; 136]); // checksum
    out.extend_from_slice(&(entries.len() as u32).to_be_bytes());
    for &(kind, sector, count, offset, length) in entries {
        out.extend_from_slice(&kind.to_be_bytes());
        out.extend_from_slice(&0u32.to_be_bytes());
        out.extend_from_slice(&sector.to_be_bytes());
        out.extend_from_slice(&count.to_be_bytes());
        out.extend_from_slice(&offset.to_be_bytes());
        out.extend_from_slice(&length.to_be_bytes());
    }
    out
}

fn trailer(
    data_fork_length: u64,
    xml_offset: u64,
    xml_length: u64,
    sector_count: u64,
    checksum_type: u32,
    crc: u32,
) -> [u8; 512] {
    let mut t = [0u8; 512];
    t[0..4].copy_from_slice(b"koly");
    t[4..8].copy_from_slice(&4u32.to_be_bytes());
    t[8..12].copy_from_slice(&512u32.to_be_bytes());
    t[12..16].copy_from_slice(&1u32.to_be_bytes()); // flags
    t[24..32].copy_from_slice(&0u64.to_be_bytes());
    t[32..40].copy_from_slice(&data_fork_length.to_be_bytes());
    t[56..60].copy_from_slice(&1u32.to_be_bytes()); // segment number
    t[60..64].copy_from_slice(&1u32.to_be_bytes()); // segment count
    t[80..84].copy_from_slice(&checksum_type.to_be_bytes());
    t[84..88].copy_from_slice(&32u32.to_be_bytes());
    t[88..92].copy_from_slice(&crc.to_be_bytes());
    t[216..224].copy_from_slice(&xml_offset.to_be_bytes());
    t[224..232].copy_from_slice(&xml_length.to_be_bytes());
    t[488..492].copy_from_slice(&1u32.to_be_bytes()); // image variant
    t[492..500].copy_from_slice(&sector_count.to_be_bytes());
    t
}
