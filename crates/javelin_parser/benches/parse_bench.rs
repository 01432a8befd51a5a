use criterion::{black_box, criterion_group, criterion_main, Criterion};
use javelin_parser::parse;

// A medium-size source (~80 lines) with various constructs
const SOURCE: &str = r#"
package com.acme.bench;

import java.util.List;
import java.util.Map;
import java.util.function.Function;

public class UserService {

    private final Map<Long, User> users = new java.util.HashMap<>();
    private long nextId = 1L;

    public User createUser(String name, String email) {
        User user = new User(nextId++, name, email);
        users.put(user.id(), user);
        return user;
    }

    public User getUserById(long id) {
        return users.get(id);
    }

    public boolean deleteUser(long id) {
        return users.remove(id) != null;
    }

    public List<User> adults() {
        java.util.ArrayList<User> result = new java.util.ArrayList<>();
        for (User user : users.values()) {
            if (user.age() >= 18) {
                result.add(user);
            }
        }
        return result;
    }

    public <T> List<T> mapUsers(Function<User, T> mapper) {
        java.util.ArrayList<T> result = new java.util.ArrayList<>();
        users.values().forEach(user -> result.add(mapper.apply(user)));
        return result;
    }

    public int classify(User user) {
        int score = switch (user.age() / 10) {
            case 0, 1 -> 0;
            case 2, 3 -> 1;
            default -> 2;
        };
        return score << 1 | (user.age() & 1);
    }

    record User(long id, String name, String email) {
        int age() {
            return (int) (id % 100L);
        }
    }

    enum Status {
        ACTIVE("a"), DISABLED("d");

        private final String code;

        Status(String code) {
            this.code = code;
        }

        public String code() {
            return code;
        }
    }
}
"#;

fn bench_parse_java(c: &mut Criterion) {
    c.bench_function("parse_java_medium", |b| {
        b.iter(|| {
            let tree = parse(black_box(SOURCE)).unwrap();
            black_box(tree);
        });
    });
}

criterion_group!(benches, bench_parse_java);
criterion_main!(benches);
