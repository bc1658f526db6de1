//! Region identifiers: the national total and the 47 prefectures, keyed by
//! e-Stat standard area code.

use crate::error::{NowcastError, Result};
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Region {
    /// Five-digit e-Stat area code ("00000" for the whole country)
    pub code: String,
    pub name_ja: String,
    pub name_en: String,
}

const AREAS: [(&str, &str, &str); 48] = [
    ("00000", "全国", "Japan"),
    ("01000", "北海道", "Hokkaido"),
    ("02000", "青森県", "Aomori"),
    ("03000", "岩手県", "Iwate"),
    ("04000", "宮城県", "Miyagi"),
    ("05000", "秋田県", "Akita"),
    ("06000", "山形県", "Yamagata"),
    ("07000", "福島県", "Fukushima"),
    ("08000", "茨城県", "Ibaraki"),
    ("09000", "栃木県", "Tochigi"),
    ("10000", "群馬県", "Gunma"),
    ("11000", "埼玉県", "Saitama"),
    ("12000", "千葉県", "Chiba"),
    ("13000", "東京都", "Tokyo"),
    ("14000", "神奈川県", "Kanagawa"),
    ("15000", "新潟県", "Niigata"),
    ("16000", "富山県", "Toyama"),
    ("17000", "石川県", "Ishikawa"),
    ("18000", "福井県", "Fukui"),
    ("19000", "山梨県", "Yamanashi"),
    ("20000", "長野県", "Nagano"),
    ("21000", "岐阜県", "Gifu"),
    ("22000", "静岡県", "Shizuoka"),
    ("23000", "愛知県", "Aichi"),
    ("24000", "三重県", "Mie"),
    ("25000", "滋賀県", "Shiga"),
    ("26000", "京都府", "Kyoto"),
    ("27000", "大阪府", "Osaka"),
    ("28000", "兵庫県", "Hyogo"),
    ("29000", "奈良県", "Nara"),
    ("30000", "和歌山県", "Wakayama"),
    ("31000", "鳥取県", "Tottori"),
    ("32000", "島根県", "Shimane"),
    ("33000", "岡山県", "Okayama"),
    ("34000", "広島県", "Hiroshima"),
    ("35000", "山口県", "Yamaguchi"),
    ("36000", "徳島県", "Tokushima"),
    ("37000", "香川県", "Kagawa"),
    ("38000", "愛媛県", "Ehime"),
    ("39000", "高知県", "Kochi"),
    ("40000", "福岡県", "Fukuoka"),
    ("41000", "佐賀県", "Saga"),
    ("42000", "長崎県", "Nagasaki"),
    ("43000", "熊本県", "Kumamoto"),
    ("44000", "大分県", "Oita"),
    ("45000", "宮崎県", "Miyazaki"),
    ("46000", "鹿児島県", "Kagoshima"),
    ("47000", "沖縄県", "Okinawa"),
];

lazy_static! {
    static ref REGIONS: Vec<Region> = AREAS
        .iter()
        .map(|(code, ja, en)| Region {
            code: code.to_string(),
            name_ja: ja.to_string(),
            name_en: en.to_string(),
        })
        .collect();
}

impl Region {
    pub fn national() -> Region {
        REGIONS[0].clone()
    }

    pub fn all() -> &'static [Region] {
        &REGIONS
    }

    /// Look up by area code ("13", "13000"), Japanese name with or without
    /// the 都道府県 suffix ("東京都", "東京"), or English name ("tokyo").
    pub fn lookup(input: &str) -> Result<Region> {
        let needle = input.trim();
        if needle.is_empty() {
            return Err(NowcastError::UnknownRegion(input.to_string()));
        }

        let as_code = match needle.len() {
            1 | 2 if needle.chars().all(|c| c.is_ascii_digit()) => {
                format!("{:0>2}000", needle)
            }
            _ => needle.to_string(),
        };
        let lowered = needle.to_lowercase();

        REGIONS
            .iter()
            .find(|r| {
                r.code == as_code
                    || r.name_ja == needle
                    || strip_suffix(&r.name_ja) == needle
                    || r.name_en.to_lowercase() == lowered
                    || (r.code == "00000"
                        && matches!(lowered.as_str(), "national" | "all" | "nationwide"))
            })
            .cloned()
            .ok_or_else(|| NowcastError::UnknownRegion(input.to_string()))
    }
}

fn strip_suffix(name: &str) -> &str {
    // 北海道 keeps its name; the others drop 都/府/県
    if name == "北海道" {
        return name;
    }
    name.strip_suffix(['都', '府', '県']).unwrap_or(name)
}
