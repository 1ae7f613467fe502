//! An example.

// TODO: write a real program
fn main() {
    let s = "// TODO: not a comment";
    /* FIXME(#12): handle errors
       /* nested */ still in the outer comment */
    println!("{s}"); // BUG - prints twice
}
/// XXX
