use oauth_vcr::errors::VcrError;
use oauth_vcr::loader::{SourceLoader, TransformingLoader};
use oauth_vcr::rewriter::PatternRewriter;
use oauth_vcr::runtime::FakeFileSystem;
use std::path::Path;
use std::sync::Arc;

fn rewriter() -> PatternRewriter {
    PatternRewriter::oauth().expect("rewriter")
}

#[test]
fn construction_and_subtyping_sites_are_redirected() {
    let source = "\
<?php
$a = new OAuth($key, $secret);
$b = NEW \\oauth ($key, $secret, OAUTH_SIG_METHOD_HMACSHA1);
class Client extends OAuth
{
}
class Other extends \\OAuth implements Countable {}
";
    let expected = "\
<?php
$a = new \\VCR\\Util\\OAuth($key, $secret);
$b = new \\VCR\\Util\\OAuth($key, $secret, OAUTH_SIG_METHOD_HMACSHA1);
class Client extends \\VCR\\Util\\OAuth
{
}
class Other extends \\VCR\\Util\\OAuth implements Countable {}
";
    assert_eq!(rewriter().transform(source), expected);
}

#[test]
fn lookalike_identifiers_are_left_alone() {
    let source = "\
$f = new OAuthTokenFactory();
$g = new MyOAuth($k);
renew OAuth($k);
class Provider extends OAuthProvider {}
$h = OAuth::getRequestHeader();
// the OAuth client
";
    assert_eq!(rewriter().transform(source), source);
}

#[test]
fn rewriting_is_idempotent() {
    let rewriter = rewriter();
    let source = "new OAuth($k, $s); class A extends OAuth {}";
    let once = rewriter.transform(source);
    assert_ne!(once, source);
    assert_eq!(rewriter.transform(&once), once);
}

#[test]
fn custom_type_names_are_matched_literally() {
    let rewriter = PatternRewriter::new("Sign.er", r"\Proxy\Signer").expect("rewriter");
    assert_eq!(
        rewriter.transform("new Sign.er(); new SignXer();"),
        r"new \Proxy\Signer(); new SignXer();"
    );
}

#[test]
fn self_matching_adapter_is_rejected() {
    assert!(matches!(
        PatternRewriter::new("OAuth", "OAuth"),
        Err(VcrError::InvalidPattern(_))
    ));
    assert!(matches!(
        PatternRewriter::new("", r"\VCR\Util\OAuth"),
        Err(VcrError::InvalidPattern(_))
    ));
    // Would turn `extends OAuth OAuth(` into a fresh `new OAuth(` site.
    assert!(matches!(
        PatternRewriter::new("OAuth", "Q new"),
        Err(VcrError::InvalidPattern(_))
    ));
}

#[test]
fn loader_applies_rewriter_only_while_intercepting() {
    let fs = FakeFileSystem::with_file("/src/a.php", "$c = new OAuth($k, $s);");
    let loader = TransformingLoader::new(Arc::new(fs));
    let rewriter = Arc::new(rewriter());
    rewriter.register(&loader);
    rewriter.register(&loader);

    assert_eq!(loader.transformer_names().len(), 1);
    assert_eq!(
        loader.load(Path::new("/src/a.php")).expect("load"),
        "$c = new OAuth($k, $s);"
    );

    loader.intercept();
    assert_eq!(
        loader.load(Path::new("/src/a.php")).expect("load"),
        r"$c = new \VCR\Util\OAuth($k, $s);"
    );
}
