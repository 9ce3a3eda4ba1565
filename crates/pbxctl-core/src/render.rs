// ── Config renderer ──
//
// Pure projection of records into the literal text of config sections.
// Inputs are sorted before rendering (natural key, or `(priority, name)`
// for routes), so the same record set always yields identical bytes.
// Rendered text ends with exactly one newline and never with a blank line.

use std::fmt::Display;

use crate::model::{
    DestinationType, Extension, InboundRoute, OutboundRoute, Queue, RecordKind, Trunk, TrunkKind,
};

/// Prefix of the ownership marker written into every per-record section.
pub const MANAGED_MARKER: &str = "; managed-by: pbxctl";

/// Dialplan context names owned by the renderer.
pub const INTERNAL_CONTEXT: &str = "internal";
pub const FROM_TRUNK_CONTEXT: &str = "from-trunk";
pub const OUTBOUND_CONTEXT: &str = "outbound";
pub const QUEUES_CONTEXT: &str = "queues";

/// `sip.conf` sections that records may never shadow.
pub const RESERVED_SIP_SECTIONS: [&str; 3] = ["general", "template-internal", "template-trunk"];

/// One bracketed section, header line included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedSection {
    pub name: String,
    pub text: String,
}

/// The marker line identifying sections generated for `kind` records.
pub fn marker(kind: RecordKind) -> String {
    format!("{MANAGED_MARKER} {kind}")
}

// ── Section builder ──────────────────────────────────────────────────

struct SectionWriter {
    name: String,
    text: String,
}

impl SectionWriter {
    fn new(name: &str) -> Self {
        Self::with_suffix(name, "")
    }

    fn with_suffix(name: &str, suffix: &str) -> Self {
        Self {
            name: name.to_owned(),
            text: format!("[{name}]{suffix}\n"),
        }
    }

    fn owned_by(mut self, kind: RecordKind) -> Self {
        self.line(marker(kind));
        self
    }

    fn line(&mut self, line: impl AsRef<str>) {
        self.text.push_str(line.as_ref());
        self.text.push('\n');
    }

    fn kv(&mut self, key: &str, value: impl Display) {
        self.line(format!("{key}={value}"));
    }

    fn kv_opt(&mut self, key: &str, value: Option<&String>) {
        if let Some(v) = value {
            self.kv(key, v);
        }
    }

    /// `key = value`, the spelling `queues.conf` uses.
    fn spaced(&mut self, key: &str, value: impl Display) {
        self.line(format!("{key} = {value}"));
    }

    /// Numbered dialplan steps: the first at priority 1, the rest `n`.
    fn exten(&mut self, pattern: &str, steps: &[String]) {
        for (i, app) in steps.iter().enumerate() {
            let priority = if i == 0 { "1" } else { "n" };
            self.line(format!("exten => {pattern},{priority},{app}"));
        }
    }

    fn blank(&mut self) {
        if !self.text.ends_with("\n\n") {
            self.text.push('\n');
        }
    }

    fn finish(mut self) -> RenderedSection {
        while self.text.ends_with("\n\n") {
            self.text.pop();
        }
        RenderedSection {
            name: self.name,
            text: self.text,
        }
    }
}

fn steps<const N: usize>(apps: [&str; N]) -> Vec<String> {
    apps.iter().map(|s| (*s).to_owned()).collect()
}

// ── sip.conf ─────────────────────────────────────────────────────────

/// One `[ext](template-internal)` section per extension.
pub fn sip_extension_sections(extensions: &[Extension]) -> Vec<RenderedSection> {
    let mut sorted: Vec<&Extension> = extensions.iter().collect();
    sorted.sort_by(|a, b| a.extension.cmp(&b.extension));

    sorted
        .into_iter()
        .map(|ext| {
            let mut w = SectionWriter::with_suffix(&ext.extension, "(template-internal)")
                .owned_by(RecordKind::Extension);
            w.line(format!("callerid=\"{}\" <{}>", ext.name, ext.extension));
            w.kv("secret", &ext.secret);
            w.kv("mailbox", ext.mailbox.as_deref().unwrap_or(&ext.extension));
            w.kv_opt("email", ext.email.as_ref());
            w.kv_opt("callgroup", ext.call_group.as_ref());
            w.kv_opt("pickupgroup", ext.pickup_group.as_ref());
            w.kv("host", &ext.host);
            w.kv("context", &ext.context);
            w.kv("dtmfmode", ext.dtmf_mode);
            w.kv("transport", ext.transport);
            w.kv("nat", ext.nat);
            w.kv("call-limit", ext.call_limit);
            w.kv("disallow", &ext.disallow);
            w.kv("allow", &ext.allow);
            w.finish()
        })
        .collect()
}

/// One `[name](template-trunk)` section per SIP trunk. Other trunk kinds
/// belong to other channel drivers and are skipped.
pub fn sip_trunk_sections(trunks: &[Trunk]) -> Vec<RenderedSection> {
    let mut sorted: Vec<&Trunk> = trunks.iter().filter(|t| t.kind == TrunkKind::Sip).collect();
    sorted.sort_by(|a, b| a.name.cmp(&b.name));

    sorted
        .into_iter()
        .map(|trunk| {
            let mut w = SectionWriter::with_suffix(&trunk.name, "(template-trunk)")
                .owned_by(RecordKind::Trunk);
            w.kv("host", &trunk.host);
            w.kv_opt("username", trunk.username.as_ref());
            w.kv_opt("secret", trunk.secret.as_ref());
            w.kv("context", &trunk.context);
            w.kv("dtmfmode", trunk.dtmf_mode);
            w.kv("transport", trunk.transport);
            w.kv("insecure", &trunk.insecure);
            w.kv("nat", trunk.nat);
            w.kv("qualify", "yes");
            w.kv("qualifyfreq", trunk.qualify_freq);
            w.kv("disallow", &trunk.disallow);
            w.kv("allow", &trunk.allow);
            w.finish()
        })
        .collect()
}

// ── queues.conf ──────────────────────────────────────────────────────

/// Interface string for a queue member; bare names are SIP peers.
pub fn member_interface(member: &str) -> String {
    if member.contains('/') {
        member.to_owned()
    } else {
        format!("SIP/{member}")
    }
}

/// One `[name]` section per queue, members in insertion order.
pub fn queue_sections(queues: &[Queue]) -> Vec<RenderedSection> {
    let mut sorted: Vec<&Queue> = queues.iter().collect();
    sorted.sort_by(|a, b| a.name.cmp(&b.name));

    sorted
        .into_iter()
        .map(|queue| {
            let mut w = SectionWriter::new(&queue.name).owned_by(RecordKind::Queue);
            w.spaced("strategy", queue.strategy);
            w.spaced("timeout", queue.timeout);
            w.spaced("wrapuptime", queue.wrapuptime);
            w.spaced("maxlen", queue.maxlen);
            if let Some(announce) = &queue.announce {
                w.spaced("announce", announce);
            }
            w.spaced("musicclass", &queue.music_class);
            for member in &queue.members {
                w.spaced("member", member_interface(member));
            }
            w.finish()
        })
        .collect()
}

// ── extensions.conf ──────────────────────────────────────────────────

/// `[internal]`: direct dial per extension, feature codes, and the hop
/// into `[outbound]` once any outbound route exists.
pub fn internal_context(extensions: &[Extension], has_outbound: bool) -> RenderedSection {
    let mut sorted: Vec<&Extension> = extensions.iter().collect();
    sorted.sort_by(|a, b| a.extension.cmp(&b.extension));

    let mut w = SectionWriter::new(INTERNAL_CONTEXT);
    w.line("; Internal extensions");
    for ext in sorted {
        let num = &ext.extension;
        w.exten(
            num,
            &[
                format!("NoOp(Dialing extension {num})"),
                format!("Dial(SIP/{num},20)"),
                "Hangup()".to_owned(),
            ],
        );
        w.blank();
    }

    w.line("; Voicemail access");
    w.exten(
        "*98",
        &steps([
            "NoOp(Voicemail)",
            "VoiceMailMain(${CALLERID(num)}@default)",
            "Hangup()",
        ]),
    );
    w.blank();
    w.line("; Echo test");
    w.exten(
        "*43",
        &steps([
            "NoOp(Echo Test)",
            "Answer()",
            "Playback(demo-echotest)",
            "Echo()",
            "Playback(demo-echodone)",
            "Hangup()",
        ]),
    );
    w.blank();
    w.line("; Time");
    w.exten(
        "*60",
        &steps([
            "NoOp(Time)",
            "Answer()",
            "Wait(1)",
            "SayUnixTime()",
            "Hangup()",
        ]),
    );
    w.blank();
    w.line("; Call pickup");
    w.exten("*8", &steps(["NoOp(Call Pickup)", "PickUp()", "Hangup()"]));

    if has_outbound {
        w.blank();
        w.line("; Outbound dialing");
        w.exten("_X.", &steps(["Goto(outbound,${EXTEN},1)"]));
    }
    w.finish()
}

fn route_goto(kind: DestinationType, destination: &str) -> String {
    match kind {
        DestinationType::Extension => format!("Goto({INTERNAL_CONTEXT},{destination},1)"),
        DestinationType::Queue => format!("Goto({QUEUES_CONTEXT},{destination},1)"),
        DestinationType::Ivr => format!("Goto(ivr-{destination},s,1)"),
    }
}

fn by_priority<'a, T>(items: &'a [T], key: impl Fn(&T) -> (i32, &str)) -> Vec<&'a T> {
    let mut sorted: Vec<&T> = items.iter().collect();
    sorted.sort_by(|a, b| key(*a).cmp(&key(*b)));
    sorted
}

/// `[from-trunk]`: the `s` handler takes the first route without a DID,
/// then one block per DID.
pub fn from_trunk_context(routes: &[InboundRoute]) -> RenderedSection {
    let sorted = by_priority(routes, |r| (r.priority, r.name.as_str()));

    let mut w = SectionWriter::new(FROM_TRUNK_CONTEXT);
    w.line("; Inbound routes");

    let mut default = vec!["NoOp(Inbound call from trunk - default handler)".to_owned()];
    if let Some(route) = sorted.iter().find(|r| r.did.is_none()) {
        default.push(route_goto(route.destination_type, &route.destination));
    }
    default.push("Hangup()".to_owned());
    w.exten("s", &default);

    for route in sorted {
        let Some(did) = &route.did else { continue };
        let mut block = vec![format!("NoOp(Inbound call for DID: {did})")];
        if let Some(name) = &route.caller_id_name {
            block.push(format!("Set(CALLERID(name)={name})"));
        }
        block.push(route_goto(route.destination_type, &route.destination));
        block.push("Hangup()".to_owned());
        w.blank();
        w.exten(did, &block);
    }
    w.finish()
}

/// Dial pattern with exactly one leading `_`.
pub fn normalize_pattern(pattern: &str) -> String {
    format!("_{}", pattern.trim_start_matches('_'))
}

/// `Set(OUTNUM=...)`: strip `prefix` digits, then prepend.
fn outnum_step(prefix: Option<&str>, prepend: Option<&str>) -> String {
    let exten = match prefix {
        Some(p) if !p.is_empty() => format!("${{EXTEN:{}}}", p.chars().count()),
        _ => "${EXTEN}".to_owned(),
    };
    format!("Set(OUTNUM={}{exten})", prepend.unwrap_or_default())
}

/// `[outbound]`: catch-all hangup, then one block per route in
/// `(priority, name)` order.
pub fn outbound_context(routes: &[OutboundRoute]) -> RenderedSection {
    let sorted = by_priority(routes, |r| (r.priority, r.name.as_str()));

    let mut w = SectionWriter::new(OUTBOUND_CONTEXT);
    w.line("; Outbound routes");
    w.exten(
        "_.",
        &steps(["NoOp(No matching outbound route)", "Hangup()"]),
    );

    for route in sorted {
        let mut block = vec![format!("NoOp(Matched outbound route: {})", route.name)];
        let cid_name = route
            .caller_id_name
            .as_ref()
            .or(route.caller_id_number.as_ref());
        if let Some(name) = cid_name {
            block.push(format!("Set(CALLERID(name)={name})"));
        }
        if let Some(num) = &route.caller_id_number {
            block.push(format!("Set(CALLERID(num)={num})"));
        }
        block.push(outnum_step(
            route.prefix.as_deref(),
            route.prepend.as_deref(),
        ));
        block.push(format!("Dial(SIP/${{OUTNUM}}@{},60)", route.trunk));
        block.push("Hangup()".to_owned());
        w.blank();
        w.exten(&normalize_pattern(&route.pattern), &block);
    }
    w.finish()
}

/// `[queues]`: answer and enter the queue named by the dialed extension.
pub fn queues_context(queues: &[Queue]) -> RenderedSection {
    let mut sorted: Vec<&Queue> = queues.iter().collect();
    sorted.sort_by(|a, b| a.name.cmp(&b.name));

    let mut w = SectionWriter::new(QUEUES_CONTEXT);
    for queue in sorted {
        w.exten(
            &queue.name,
            &[
                "Answer()".to_owned(),
                format!("Queue({})", queue.name),
                "Hangup()".to_owned(),
            ],
        );
        w.blank();
    }
    w.finish()
}

// ── Skeletons ────────────────────────────────────────────────────────

pub const SIP_SKELETON: &str = "\
[general]
context=default
allowoverlap=no
udpbindaddr=0.0.0.0
tcpbindaddr=0.0.0.0
tcpenable=yes
transport=udp,tcp
srvlookup=yes
realm=pbx.local
useragent=pbxctl
alwaysauthreject=yes
notifyringing=yes
notifyhold=yes
callevents=yes
allowsubscribe=yes
subscribecontext=default
language=en
disallow=all
allow=alaw
allow=ulaw
allow=gsm
allow=g722
nat=force_rport,comedia
directmedia=no

[template-internal](!)
type=friend
host=dynamic
context=internal
disallow=all
allow=alaw
allow=ulaw
allow=gsm
nat=force_rport,comedia
qualify=yes
directmedia=no
dtmfmode=auto
call-limit=5

[template-trunk](!)
type=peer
context=from-trunk
insecure=port,invite
qualify=yes
directmedia=no
";

pub const DIALPLAN_SKELETON: &str = "\
[general]
static=yes
writeprotect=no
autofallthrough=yes
extenpatternmatchnew=yes
clearglobalvars=no

[globals]
CONSOLE=Console/dsp
IAXINFO=guest
TRUNK=DAHDI/G2
TRUNKMSD=1

[default]
exten => s,1,Verbose(1,Unrouted call handler)
exten => s,n,Answer()
exten => s,n,Wait(1)
exten => s,n,Playback(tt-weasels)
exten => s,n,Hangup()

exten => _.,1,Verbose(1,Catch-all extension)
exten => _.,n,Answer()
exten => _.,n,Wait(1)
exten => _.,n,Playback(invalid)
exten => _.,n,Hangup()
";

pub const QUEUES_SKELETON: &str = "\
[general]
persistentmembers = yes
autofill = yes
monitor-type = MixMonitor
shared_lastcall = yes
";

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::model::{
        CreateExtensionRequest, CreateInboundRouteRequest, CreateOutboundRouteRequest,
        CreateQueueRequest, CreateTrunkRequest,
    };

    fn ext(num: &str, name: &str) -> Extension {
        CreateExtensionRequest {
            extension: num.into(),
            name: name.into(),
            secret: "s3cret".into(),
            ..Default::default()
        }
        .into_record(Utc::now())
    }

    fn outbound(name: &str, pattern: &str, priority: i32) -> OutboundRoute {
        CreateOutboundRouteRequest {
            name: name.into(),
            pattern: pattern.into(),
            trunk: "T1".into(),
            priority,
            ..Default::default()
        }
        .into_record(Utc::now())
    }

    #[test]
    fn extension_section_uses_defaults() {
        let sections = sip_extension_sections(&[ext("101", "Alice")]);
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].name, "101");
        assert_eq!(
            sections[0].text,
            "[101](template-internal)\n\
             ; managed-by: pbxctl extension\n\
             callerid=\"Alice\" <101>\n\
             secret=s3cret\n\
             mailbox=101\n\
             host=dynamic\n\
             context=internal\n\
             dtmfmode=rfc2833\n\
             transport=udp\n\
             nat=yes\n\
             call-limit=5\n\
             disallow=all\n\
             allow=ulaw,alaw,g722\n"
        );
    }

    #[test]
    fn rendering_is_sorted_and_deterministic() {
        let a = [ext("102", "Bob"), ext("101", "Alice")];
        let b = [ext("101", "Alice"), ext("102", "Bob")];
        let names: Vec<_> = sip_extension_sections(&a)
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["101", "102"]);
        assert_eq!(internal_context(&a, false), internal_context(&b, false));
    }

    #[test]
    fn non_sip_trunks_are_not_rendered() {
        let now = Utc::now();
        let sip = CreateTrunkRequest {
            name: "T1".into(),
            host: "sip.example.net".into(),
            username: Some("acct".into()),
            ..Default::default()
        }
        .into_record(now);
        let iax = CreateTrunkRequest {
            name: "T2".into(),
            host: "iax.example.net".into(),
            kind: Some(TrunkKind::Iax),
            ..Default::default()
        }
        .into_record(now);

        let sections = sip_trunk_sections(&[sip, iax]);
        assert_eq!(sections.len(), 1);
        assert!(sections[0].text.starts_with("[T1](template-trunk)\n"));
        assert!(sections[0].text.contains("username=acct\n"));
        assert!(!sections[0].text.contains("secret="));
        assert!(sections[0].text.contains("qualifyfreq=60\n"));
    }

    #[test]
    fn queue_members_keep_insertion_order() {
        let queue = CreateQueueRequest {
            name: "support".into(),
            members: vec!["103".into(), "101".into(), "PJSIP/200".into()],
            ..Default::default()
        }
        .into_record(Utc::now());

        let text = &queue_sections(&[queue])[0].text;
        let members: Vec<&str> = text.lines().filter(|l| l.starts_with("member")).collect();
        assert_eq!(
            members,
            vec!["member = SIP/103", "member = SIP/101", "member = PJSIP/200"]
        );
        assert!(text.contains("strategy = ringall\n"));
        assert!(!text.contains("announce"));
    }

    #[test]
    fn prefix_strip_renders_substring_offset() {
        let mut route = outbound("local", "9XXXXXXXX", 0);
        route.prefix = Some("9".into());

        let text = outbound_context(&[route]).text;
        assert!(text.contains("exten => _9XXXXXXXX,n,Set(OUTNUM=${EXTEN:1})\n"));
        assert!(text.contains("exten => _9XXXXXXXX,n,Dial(SIP/${OUTNUM}@T1,60)\n"));
    }

    #[test]
    fn prepend_follows_prefix_strip() {
        let mut route = outbound("intl", "_00.", 0);
        route.prefix = Some("00".into());
        route.prepend = Some("+".into());
        assert!(
            outbound_context(&[route])
                .text
                .contains("exten => _00.,n,Set(OUTNUM=+${EXTEN:2})\n")
        );

        let mut route = outbound("plain", "5XXX", 0);
        route.prepend = Some("84".into());
        assert!(
            outbound_context(&[route])
                .text
                .contains("exten => _5XXX,n,Set(OUTNUM=84${EXTEN})\n")
        );
    }

    #[test]
    fn pattern_gets_exactly_one_underscore() {
        assert_eq!(normalize_pattern("9XXX"), "_9XXX");
        assert_eq!(normalize_pattern("_9XXX"), "_9XXX");
        assert_eq!(normalize_pattern("__9XXX"), "_9XXX");
    }

    #[test]
    fn outbound_routes_follow_priority_then_name() {
        let routes = [
            outbound("b", "2XX", 1),
            outbound("a", "3XX", 1),
            outbound("z", "1XX", 0),
        ];
        let text = outbound_context(&routes).text;
        let order: Vec<usize> = ["_1XX,1", "_3XX,1", "_2XX,1"]
            .iter()
            .map(|p| text.find(p).unwrap())
            .collect();
        assert!(order.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn outbound_caller_id_steps() {
        let mut route = outbound("cid", "9X.", 0);
        route.caller_id_number = Some("02812345".into());
        let text = outbound_context(&[route]).text;
        assert!(text.contains("Set(CALLERID(name)=02812345)"));
        assert!(text.contains("Set(CALLERID(num)=02812345)"));
    }

    #[test]
    fn inbound_routes_goto_by_destination_type() {
        let now = Utc::now();
        let to_queue = CreateInboundRouteRequest {
            name: "sales".into(),
            did: Some("842800".into()),
            destination: "sales".into(),
            destination_type: DestinationType::Queue,
            caller_id_name: Some("Sales".into()),
            ..Default::default()
        }
        .into_record(now);
        let fallback = CreateInboundRouteRequest {
            name: "main".into(),
            destination: "100".into(),
            ..Default::default()
        }
        .into_record(now);

        let text = from_trunk_context(&[to_queue, fallback]).text;
        assert!(text.contains("exten => s,n,Goto(internal,100,1)\n"));
        assert!(text.contains("exten => 842800,n,Set(CALLERID(name)=Sales)\n"));
        assert!(text.contains("exten => 842800,n,Goto(queues,sales,1)\n"));
        assert!(text.ends_with("exten => 842800,n,Hangup()\n"));
    }

    #[test]
    fn outbound_hop_only_with_routes() {
        let exts = [ext("101", "Alice")];
        assert!(!internal_context(&exts, false).text.contains("_X."));
        let text = internal_context(&exts, true).text;
        assert!(text.ends_with("exten => _X.,1,Goto(outbound,${EXTEN},1)\n"));
    }

    #[test]
    fn sections_never_end_with_blank_line() {
        let queue = CreateQueueRequest {
            name: "support".into(),
            ..Default::default()
        }
        .into_record(Utc::now());
        for section in [
            internal_context(&[], false),
            queues_context(&[queue]),
            queues_context(&[]),
            from_trunk_context(&[]),
            outbound_context(&[]),
        ] {
            assert!(section.text.ends_with('\n'));
            assert!(!section.text.ends_with("\n\n"), "{}", section.name);
        }
    }

    #[test]
    fn queues_context_snapshot() {
        let queue = CreateQueueRequest {
            name: "support".into(),
            ..Default::default()
        }
        .into_record(Utc::now());
        insta::assert_snapshot!(queues_context(&[queue]).text, @r"
        [queues]
        exten => support,1,Answer()
        exten => support,n,Queue(support)
        exten => support,n,Hangup()
        ");
    }
}
