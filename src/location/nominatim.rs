// 该文件是 Kengwa （坑洼） 项目的一部分。
// src/location/nominatim.rs - Nominatim 反向地理编码
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

use reqwest::blocking::Client;
use serde_json::Value;
use tracing::debug;

use crate::{
  config::GeocoderConfig,
  location::{GeocodeError, ReverseGeocoder},
};

pub struct NominatimGeocoder {
  client: Client,
  endpoint: String,
}

impl NominatimGeocoder {
  pub fn new(config: &GeocoderConfig) -> Result<Self, GeocodeError> {
    let client = Client::builder()
      .timeout(config.timeout())
      .connect_timeout(config.timeout())
      .user_agent(config.user_agent.clone())
      .build()?;

    Ok(Self {
      client,
      endpoint: config.endpoint.trim_end_matches('/').to_string(),
    })
  }

  fn reverse_url(&self) -> String {
    format!("{}/reverse", self.endpoint)
  }
}

impl ReverseGeocoder for NominatimGeocoder {
  fn reverse(&self, lat: &str, lon: &str) -> Result<Option<String>, GeocodeError> {
    debug!("反向地理编码: {}, {}", lat, lon);
    let response = self
      .client
      .get(self.reverse_url())
      .query(&[("format", "jsonv2"), ("lat", lat), ("lon", lon)])
      .send()?;

    let status = response.status();
    if !status.is_success() {
      return Err(GeocodeError::StatusError(status.as_u16()));
    }

    let body: Value = response.json()?;
    Ok(display_name(&body))
  }
}

/// 取出 `display_name`，服务返回 `error` 或名称为空时视为没有结果
fn display_name(body: &Value) -> Option<String> {
  if body.get("error").is_some() {
    return None;
  }
  body
    .get("display_name")
    .and_then(Value::as_str)
    .map(str::trim)
    .filter(|name| !name.is_empty())
    .map(str::to_string)
}
