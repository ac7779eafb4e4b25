// 该文件是 Kengwa （坑洼） 项目的一部分。
// src/location.rs - 坐标与地址解析
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{DEFAULT_LAT, DEFAULT_LON, PipelineConfig};

mod nominatim;
pub use self::nominatim::NominatimGeocoder;

#[derive(Error, Debug)]
pub enum GeocodeError {
  #[error("HTTP 请求失败: {0}")]
  HttpError(#[from] reqwest::Error),
  #[error("地理编码服务返回状态码 {0}")]
  StatusError(u16),
  #[error("地理编码服务不可用: {0}")]
  Unavailable(String),
}

/// 反向地理编码：坐标转地址。没有结果时返回 `Ok(None)`。
pub trait ReverseGeocoder {
  fn reverse(&self, lat: &str, lon: &str) -> Result<Option<String>, GeocodeError>;
}

impl<G: ReverseGeocoder + ?Sized> ReverseGeocoder for Box<G> {
  fn reverse(&self, lat: &str, lon: &str) -> Result<Option<String>, GeocodeError> {
    (**self).reverse(lat, lon)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressSource {
  /// 由地理编码服务给出
  Geocoded,
  /// 地理编码失败，使用 "<lat>, <lon>"
  Coordinates,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationResult {
  pub lat: String,
  pub lon: String,
  pub address: String,
  pub has_location: bool,
  pub used_default: bool,
  pub address_source: AddressSource,
}

pub struct LocationResolver<G: ReverseGeocoder> {
  geocoder: G,
  default_lat: String,
  default_lon: String,
}

impl<G: ReverseGeocoder> LocationResolver<G> {
  pub fn new(geocoder: G) -> Self {
    Self {
      geocoder,
      default_lat: DEFAULT_LAT.to_string(),
      default_lon: DEFAULT_LON.to_string(),
    }
  }

  pub fn from_config(geocoder: G, config: &PipelineConfig) -> Self {
    Self {
      geocoder,
      default_lat: config.default_lat.clone(),
      default_lon: config.default_lon.clone(),
    }
  }

  /// 解析用户提供的坐标。任一坐标缺失时两者都使用默认值；不会失败。
  pub fn resolve(&self, lat: Option<&str>, lon: Option<&str>) -> LocationResult {
    let lat = lat.map(str::trim).filter(|s| !s.is_empty());
    let lon = lon.map(str::trim).filter(|s| !s.is_empty());

    let (lat, lon, used_default) = match (lat, lon) {
      (Some(lat), Some(lon)) => (lat.to_string(), lon.to_string(), false),
      _ => {
        debug!("坐标缺失，使用默认坐标");
        (self.default_lat.clone(), self.default_lon.clone(), true)
      }
    };

    let (address, address_source) = match self.geocoder.reverse(&lat, &lon) {
      Ok(Some(address)) if !address.trim().is_empty() => {
        info!("地址解析成功: {}", address);
        (address, AddressSource::Geocoded)
      }
      Ok(_) => {
        warn!("地理编码没有结果，使用坐标作为地址");
        (format!("{}, {}", lat, lon), AddressSource::Coordinates)
      }
      Err(e) => {
        warn!("地理编码失败，使用坐标作为地址: {}", e);
        (format!("{}, {}", lat, lon), AddressSource::Coordinates)
      }
    };

    LocationResult {
      lat,
      lon,
      address,
      has_location: true,
      used_default,
      address_source,
    }
  }
}
