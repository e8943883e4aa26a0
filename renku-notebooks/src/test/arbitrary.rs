use std::iter;

use qcheck::Arbitrary;

use crate::autosave::{AbbrevOid, AutosaveName};

fn alphanumeric(rng: &mut fastrand::Rng, len: usize) -> String {
    iter::repeat_with(|| rng.alphanumeric()).take(len).collect()
}

impl Arbitrary for AbbrevOid {
    fn arbitrary(g: &mut qcheck::Gen) -> Self {
        let mut rng = fastrand::Rng::with_seed(u64::arbitrary(g));

        AbbrevOid::abbreviate(&alphanumeric(&mut rng, AbbrevOid::LEN)).unwrap()
    }
}

impl Arbitrary for AutosaveName {
    fn arbitrary(g: &mut qcheck::Gen) -> Self {
        let mut rng = fastrand::Rng::with_seed(u64::arbitrary(g));
        let len = rng.usize(1..16);
        let username = alphanumeric(&mut rng, len);
        let segments = rng.usize(1..4);
        let root_branch = iter::repeat_with(|| {
            let len = rng.usize(1..8);
            alphanumeric(&mut rng, len)
        })
        .take(segments)
        .collect::<Vec<_>>()
        .join("/");
        let root_commit = AbbrevOid::arbitrary(g);
        let final_commit = iter::repeat_with(|| AbbrevOid::arbitrary(g))
            .find(|oid| *oid != root_commit)
            .unwrap();

        AutosaveName::new(username, root_branch, &root_commit, &final_commit).unwrap()
    }
}
