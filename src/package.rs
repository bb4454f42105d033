//! DOCX Package Module
//!
//! DOCXファイル（ZIPアーカイブ）の読み込みと、XMLパートを差し替えた書き出しを行う。

use std::collections::BTreeMap;
use std::io::{Cursor, Read, Write};
use std::path::Path;

use zip::result::ZipError;
use zip::write::{FileOptions, ZipWriter};
use zip::{CompressionMethod, ZipArchive};

use crate::error::MarkMergeError;
use crate::security::SecurityConfig;

/// 本文パートのパス
pub(crate) const DOCUMENT_PART: &str = "word/document.xml";

/// ZIPエラーを変換
pub(crate) fn zip_error(e: ZipError) -> MarkMergeError {
    MarkMergeError::Zip(format!("{}", e))
}

/// DOCXパッケージ
///
/// アーカイブ全体をメモリ上に保持します。パートを差し替える場合も
/// 変更のないエントリは圧縮データのままコピーされます。
#[derive(Debug, Clone)]
pub(crate) struct DocxPackage {
    /// アーカイブのバイト列
    bytes: Vec<u8>,
}

impl DocxPackage {
    /// ファイルパスからパッケージを開く
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, MarkMergeError> {
        let bytes = std::fs::read(path.as_ref())?;
        Self::from_bytes(bytes)
    }

    /// メモリ上のバイト列からパッケージを開く
    ///
    /// セキュリティ制限（エントリ数、パス、サイズ）を検査し、
    /// 本文パート（`word/document.xml`）が存在することを確認します。
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, MarkMergeError> {
        let security_config = SecurityConfig::default();
        security_config.check_input_size(bytes.len() as u64)?;

        {
            let mut archive =
                ZipArchive::new(Cursor::new(bytes.as_slice())).map_err(zip_error)?;
            security_config.check_archive(&mut archive)?;

            if archive.by_name(DOCUMENT_PART).is_err() {
                return Err(MarkMergeError::Zip(format!(
                    "Not a DOCX package: '{}' is missing",
                    DOCUMENT_PART
                )));
            }
        }

        Ok(Self { bytes })
    }

    /// アーカイブ内のエントリ名（格納順）
    pub fn part_names(&self) -> Result<Vec<String>, MarkMergeError> {
        let mut archive = self.archive()?;
        (0..archive.len())
            .map(|i| {
                archive
                    .by_index_raw(i)
                    .map(|file| file.name().to_string())
                    .map_err(zip_error)
            })
            .collect()
    }

    /// XMLパートをUTF-8文字列として読み込む
    ///
    /// # 戻り値
    ///
    /// * `Ok(Some(String))` - パートが存在する場合
    /// * `Ok(None)` - パートが存在しない場合
    pub fn read_part(&self, name: &str) -> Result<Option<String>, MarkMergeError> {
        let mut archive = self.archive()?;
        let mut file = match archive.by_name(name) {
            Ok(file) => file,
            Err(ZipError::FileNotFound) => return Ok(None),
            Err(e) => return Err(zip_error(e)),
        };

        let mut content = String::new();
        file.read_to_string(&mut content)?;
        Ok(Some(content))
    }

    /// 指定したパートを差し替えたアーカイブを生成する
    ///
    /// 差し替えるパートはDeflateで再圧縮し、それ以外のエントリは元の順序のまま
    /// 圧縮データをそのままコピーします。
    pub fn with_parts(&self, parts: &BTreeMap<String, String>) -> Result<Vec<u8>, MarkMergeError> {
        let mut archive = self.archive()?;
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

        for i in 0..archive.len() {
            let file = archive.by_index_raw(i).map_err(zip_error)?;
            match parts.get(file.name()) {
                Some(content) => {
                    let name = file.name().to_string();
                    drop(file);
                    writer.start_file(name, options).map_err(zip_error)?;
                    writer.write_all(content.as_bytes())?;
                }
                None => writer.raw_copy_file(file).map_err(zip_error)?,
            }
        }

        let cursor = writer.finish().map_err(zip_error)?;
        Ok(cursor.into_inner())
    }

    fn archive(&self) -> Result<ZipArchive<Cursor<&[u8]>>, MarkMergeError> {
        ZipArchive::new(Cursor::new(self.bytes.as_slice())).map_err(zip_error)
    }
}
