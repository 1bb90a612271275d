//! Static cross-lingual synonym table and query-intent pattern lists.
//!
//! Encoded as compile-time data rather than loaded from disk. A
//! representative slice of Chinese↔English networking/Cumulus-Linux terms,
//! protocol abbreviations and command verbs — the expansion mechanism only
//! needs to be one-hop and substring-keyed, not an exhaustive dictionary.

use std::collections::HashMap;
use std::sync::LazyLock;

/// `token -> expansion list`. Both directions are represented explicitly
/// (e.g. `"mlag" -> ["链路聚合", ...]` and `"链路聚合" -> ["mlag", ...]`) since
/// expansion is a single hop over this table, not a transitive closure.
pub static SYNONYMS: LazyLock<HashMap<&'static str, Vec<&'static str>>> = LazyLock::new(|| {
    HashMap::from([
        ("mlag", vec!["链路聚合", "多机箱链路聚合", "bond mlag"]),
        ("链路聚合", vec!["mlag", "bond"]),
        ("bond", vec!["绑定", "链路聚合", "mlag"]),
        ("绑定", vec!["bond", "mlag"]),
        ("bgp", vec!["边界网关协议"]),
        ("边界网关协议", vec!["bgp"]),
        ("evpn", vec!["以太网虚拟专用网"]),
        ("vxlan", vec!["虚拟可扩展局域网"]),
        ("ospf", vec!["开放式最短路径优先"]),
        ("vlan", vec!["虚拟局域网"]),
        ("虚拟局域网", vec!["vlan"]),
        ("interface", vec!["接口", "端口"]),
        ("接口", vec!["interface", "port"]),
        ("端口", vec!["port", "interface"]),
        ("port", vec!["端口", "interface"]),
        ("config", vec!["配置", "设置"]),
        ("配置", vec!["config", "set", "setting"]),
        ("show", vec!["显示", "查看"]),
        ("显示", vec!["show"]),
        ("查看", vec!["show", "display"]),
        ("set", vec!["设置", "配置"]),
        ("设置", vec!["set", "config"]),
        ("route", vec!["路由"]),
        ("路由", vec!["route", "routing"]),
        ("switch", vec!["交换机"]),
        ("交换机", vec!["switch"]),
        ("cumulus", vec!["cumulus linux", "nvue"]),
        ("nvue", vec!["nv set", "nv show", "nv config"]),
        ("error", vec!["错误", "故障"]),
        ("错误", vec!["error", "fail"]),
        ("故障", vec!["error", "failure", "troubleshoot"]),
        ("debug", vec!["调试", "排错"]),
        ("调试", vec!["debug"]),
        ("排错", vec!["troubleshoot", "debug"]),
        ("link", vec!["链路"]),
        ("链路", vec!["link"]),
        ("down", vec!["宕机", "断开"]),
        ("up", vec!["启用", "正常"]),
        ("ip", vec!["网络地址", "互联网协议"]),
        ("address", vec!["地址"]),
        ("地址", vec!["address"]),
        ("bridge", vec!["网桥"]),
        ("网桥", vec!["bridge"]),
        ("netq", vec!["网络质量"]),
        ("platform", vec!["平台"]),
        ("平台", vec!["platform"]),
    ])
});

/// One-hop synonym expansion of `token`: adds the token's own mapping,
/// plus the values of every mapping whose key is a *substring* of `token`.
pub fn expand(token: &str) -> Vec<&'static str> {
    let mut out = Vec::new();
    if let Some(values) = SYNONYMS.get(token) {
        out.extend(values.iter().copied());
    }
    for (key, values) in SYNONYMS.iter() {
        if *key != token && token.contains(key) {
            out.extend(values.iter().copied());
        }
    }
    out
}

/// Coarse classification of a query's intent, driving the keyword scorer's
/// content bonuses and the RRF fusion weights.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryIntent {
    pub is_command: bool,
    pub is_concept: bool,
    pub is_troubleshooting: bool,
}

impl QueryIntent {
    pub fn classify(lower_query: &str) -> Self {
        Self {
            is_command: contains_any(lower_query, COMMAND_PATTERNS),
            is_concept: contains_any(lower_query, CONCEPT_PATTERNS),
            is_troubleshooting: contains_any(lower_query, TROUBLESHOOTING_PATTERNS),
        }
    }
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

pub const COMMAND_PATTERNS: &[&str] = &[
    "nv set", "nv show", "nv config", "nvue", "show", "配置", "如何使用", "如何配置", "怎么配置", "命令",
];

pub const CONCEPT_PATTERNS: &[&str] = &[
    "what is", "什么是", "介绍", "定义", "是什么",
];

pub const TROUBLESHOOTING_PATTERNS: &[&str] = &[
    "debug", "错误", "问题", "起不来", "故障", "troubleshoot", "fail", "down",
];

/// Substring patterns identifying "technical/command-heavy" queries, used to
/// pick the intent-aware RRF weights during fusion.
pub const TECHNICAL_QUERY_PATTERNS: &[&str] = &[
    "mlag", "bgp", "evpn", "vxlan", "bond", "cumulus", "nv set", "nv show", "show", "如何", "配置", "命令",
];

/// Substrings the keyword scorer treats as "mentions an error/failure" for
/// the troubleshooting content bonus.
pub const TROUBLE_KEYWORDS: &[&str] = &[
    "error", "fail", "failure", "down", "drop", "troubleshoot", "debug", "log", "problem", "issue",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expand_is_one_hop_and_bidirectional() {
        let expanded = expand("mlag");
        assert!(expanded.contains(&"链路聚合"));
        let expanded_cn = expand("链路聚合");
        assert!(expanded_cn.contains(&"mlag"));
    }

    #[test]
    fn substring_key_expansion_applies() {
        // "mlag-id" contains the key "mlag" even though it is not itself a key.
        let expanded = expand("mlag-id");
        assert!(expanded.contains(&"链路聚合"));
    }

    #[test]
    fn classifies_command_intent() {
        let intent = QueryIntent::classify("nv set interface swp1");
        assert!(intent.is_command);
    }

    #[test]
    fn classifies_troubleshooting_intent() {
        let intent = QueryIntent::classify("接口起不来 怎么办");
        assert!(intent.is_troubleshooting);
    }
}
