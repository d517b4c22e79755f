use std::{
    fs::{File, OpenOptions},
    io::{Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};

use tracing::{debug, info};

use crate::{
    storage::{VOLUME_HEADER_SIZE, header::VolumeHeader},
    types::{
        FileId, PAGE_SIZE, PageId, PageNo, VolNo,
        error::{CollaboratorError, Result},
        page::SlottedPage,
    },
};

/// A single-file volume: a header followed by `page_count` pages.
pub struct Volume {
    pub path: PathBuf,
    pub header: VolumeHeader,
    file: File,
}

impl Volume {
    /// Opens the volume at `path`, creating it with number `volume` if it
    /// does not exist yet.
    pub fn new<P: AsRef<Path>>(path: P, volume: VolNo) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            info!(path = %path.display(), "opening existing volume");
            Self::open_existing(path)
        } else {
            info!(path = %path.display(), volume, "creating new volume");
            Self::create_new(path, volume)
        }
    }

    pub fn create_new<P: AsRef<Path>>(path: P, volume: VolNo) -> Result<Self> {
        let path = path.as_ref();
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .read(true)
            .truncate(true)
            .open(path)?;
        let header = VolumeHeader::new(volume);
        file.write_all(&header.to_bytes())?;
        file.flush()?;
        Ok(Self {
            path: path.to_path_buf(),
            header,
            file,
        })
    }

    pub fn open_existing<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut file = OpenOptions::new().read(true).write(true).open(path)?;
        let mut header_buffer = vec![0u8; VOLUME_HEADER_SIZE];
        file.seek(SeekFrom::Start(0))?;
        file.read_exact(&mut header_buffer)?;
        let header = VolumeHeader::from_bytes(&header_buffer)?;

        let data_size = file.metadata()?.len() - VOLUME_HEADER_SIZE as u64;
        if data_size / PAGE_SIZE as u64 != header.page_count as u64 {
            return Err(CollaboratorError::InvalidVolumeHeader {
                reason: "File size doesn't match header".to_string(),
            }
            .into());
        }

        Ok(Self {
            path: path.to_path_buf(),
            header,
            file,
        })
    }

    pub fn volume_no(&self) -> VolNo {
        self.header.volume
    }

    pub fn page_count(&self) -> u32 {
        self.header.page_count
    }

    fn page_offset(&self, page_no: PageNo) -> u64 {
        VOLUME_HEADER_SIZE as u64 + page_no as u64 * PAGE_SIZE as u64
    }

    fn check_page(&self, page_no: PageNo) -> Result<()> {
        if page_no >= self.header.page_count {
            return Err(CollaboratorError::PageNotResident {
                pid: PageId::new(self.header.volume, page_no),
            }
            .into());
        }
        Ok(())
    }

    pub fn read_page(&mut self, page_no: PageNo) -> Result<SlottedPage> {
        self.check_page(page_no)?;
        let mut buffer = vec![0u8; PAGE_SIZE];
        self.file.seek(SeekFrom::Start(self.page_offset(page_no)))?;
        self.file.read_exact(&mut buffer)?;
        SlottedPage::from_bytes(&buffer)
    }

    pub fn write_page(&mut self, page: &SlottedPage) -> Result<()> {
        let page_no = page.pid().page_no;
        self.check_page(page_no)?;
        let page_bytes = page.to_bytes();
        self.file.seek(SeekFrom::Start(self.page_offset(page_no)))?;
        self.file.write_all(&page_bytes)?;
        self.file.flush()?;
        Ok(())
    }

    /// Appends an empty slotted page owned by `fid`.
    pub fn allocate_page(&mut self, fid: FileId) -> Result<PageId> {
        let pid = PageId::new(self.header.volume, self.header.page_count);
        self.header.page_count += 1;
        self.write_page(&SlottedPage::new(pid, fid))?;
        self.header.change_counter = self.header.change_counter.wrapping_add(1);
        self.update_header_in_file()?;
        debug!(%pid, fid, "allocated page");
        Ok(pid)
    }

    fn update_header_in_file(&mut self) -> Result<()> {
        let header_bytes = self.header.to_bytes();
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(&header_bytes)?;
        self.file.flush()?;
        Ok(())
    }
}
