use streamrelay::server::utils::packer::{MAX_WORD_COUNT, PackedScript, unpack_script};

const PACKED_PLAYER: &str = r#"<script>eval(function(p,a,c,k,e,d){while(c--)if(k[c])p=p.replace(new RegExp('\\b'+c.toString(a)+'\\b','g'),k[c]);return p}('0 1=2("3");1.4({5:[{6:"7://8.9.a/b/c.d"}]});',36,14,'var|player|jwplayer|vplayer|setup|sources|file|https|cdn|example|com|hls|master|m3u8'.split('|'),0,{}))</script>"#;

#[test]
fn reproduce_the_original_player_setup() {
    let unpacked = unpack_script(PACKED_PLAYER).expect("fixture should unpack");

    assert_eq!(
        unpacked,
        r#"var player=jwplayer("vplayer");player.setup({sources:[{file:"https://cdn.example.com/hls/master.m3u8"}]});"#
    );
}

#[test]
fn parse_the_packer_arguments() {
    let packed = PackedScript::parse(PACKED_PLAYER).unwrap();

    assert_eq!(packed.base, 36);
    assert_eq!(packed.word_count, 14);
    assert_eq!(packed.dictionary.len(), 14);
    assert_eq!(packed.dictionary[13], "m3u8");
}

#[test]
fn reject_word_counts_over_the_ceiling() {
    let packed = PackedScript::new("0", 36, MAX_WORD_COUNT + 1, "word");
    assert_eq!(packed.word_count, 5001);
    assert!(packed.unpack().is_none());

    let at_ceiling = PackedScript::new("0", 36, MAX_WORD_COUNT, "word");
    assert_eq!(at_ceiling.unpack().as_deref(), Some("word"));
}

#[test]
fn reject_missing_radix_count_or_dictionary() {
    assert!(PackedScript::new("0", 0, 1, "word").unpack().is_none());
    assert!(PackedScript::new("0", 36, 0, "word").unpack().is_none());
    assert!(PackedScript::new("0", 36, 1, "").unpack().is_none());
    assert!(PackedScript::new("0", 63, 1, "word").unpack().is_none());
}

#[test]
fn not_touch_longer_tokens_when_replacing_short_ones() {
    // 1 -> one, 12 -> twelve, 123 stays since the dictionary is only 13 long
    let mut words = vec![""; 13];
    words[1] = "one";
    words[12] = "twelve";
    let packed = PackedScript::new("1 12 123", 10, 13, &words.join("|"));

    assert_eq!(packed.unpack().as_deref(), Some("one twelve 123"));
}

#[test]
fn leave_empty_dictionary_slots_alone() {
    let packed = PackedScript::new("0 1", 36, 2, "|kept");
    assert_eq!(packed.unpack().as_deref(), Some("0 kept"));
}

#[test]
fn handle_radix_62_tokens() {
    let mut words = vec![""; 37];
    words[36] = "upper";
    let packed = PackedScript::new("A a", 62, 37, &words.join("|"));

    assert_eq!(packed.unpack().as_deref(), Some("upper a"));
}

#[test]
fn return_none_without_a_packer() {
    assert!(unpack_script("<html>nothing to see</html>").is_none());
}
